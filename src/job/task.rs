//! Task kinds (C12, §4.13): `TiledImageTask` walks a render grid tile by
//! tile, `AnimationTask` walks frames. Both implement the shared [`Task`]
//! trait the job engine drives.

use crate::job::engine::TaskError;
use crate::job::output::ImageBuffer;
use crate::math::Color;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashSet;
use std::io::Write as IoWrite;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Encodes a tiled task's action id from its tile origin (§3, §8 property 10).
pub fn tiled_action_id(x: u32, y: u32) -> u32 {
    ((y & 0xFFFF) << 16) | (x & 0xFFFF)
}

fn write_fixed_scene_name(buf: &mut Vec<u8>, scene: &str) {
    buf.extend_from_slice(&crate::net::protocol::encode_fixed_string(scene).unwrap_or([0u8; crate::net::protocol::STRING_FIELD_LEN]));
}

fn read_rise_colors(mut payload: &[u8], count: usize) -> Vec<Color> {
    let mut colors = Vec::with_capacity(count);
    for _ in 0..count {
        let r = payload.read_f32::<LittleEndian>().unwrap_or(0.0) as f64;
        let g = payload.read_f32::<LittleEndian>().unwrap_or(0.0) as f64;
        let b = payload.read_f32::<LittleEndian>().unwrap_or(0.0) as f64;
        colors.push(Color::new(r, g, b));
    }
    colors
}

/// Anything the job engine can issue actions for and feed results back into
/// (§4.12).
pub trait Task: Send {
    /// Returns the next `(action_id, payload)` to dispatch, or `None` once
    /// every action has been issued (§4.12: "for each, call its
    /// `next_action`... if every task returns false, return false").
    fn next_action(&mut self) -> Option<(u32, Vec<u8>)>;

    /// Consumes one action's result payload. `Ok(true)` signals the task is
    /// fully complete and should be dropped from the engine's registry.
    fn finished(&mut self, action_id: u32, results: &[u8]) -> Result<bool, TaskError>;
}

/// A render split into a `grid_x` by `grid_y` tile grid over `res_x` by
/// `res_y` pixels (§4.13).
pub struct TiledImageTask {
    scene_filename: String,
    output_base: String,
    res_x: u32,
    res_y: u32,
    tile_w: u32,
    tile_h: u32,
    grid_x: u32,
    grid_y: u32,
    cursor: Option<(u32, u32)>,
    issued: HashSet<u32>,
    completed: HashSet<u32>,
    issued_count: usize,
    image: ImageBuffer,
    finished_issuing: AtomicBool,
    started: Instant,
}

impl TiledImageTask {
    pub fn new(scene_filename: String, res_x: u32, res_y: u32, output_base: String, grid_x: u32, grid_y: u32) -> Self {
        let tile_w = res_x.div_ceil(grid_x.max(1));
        let tile_h = res_y.div_ceil(grid_y.max(1));
        Self {
            scene_filename,
            output_base,
            res_x,
            res_y,
            tile_w,
            tile_h,
            grid_x: grid_x.max(1),
            grid_y: grid_y.max(1),
            cursor: Some((0, 0)),
            issued: HashSet::new(),
            completed: HashSet::new(),
            issued_count: 0,
            image: ImageBuffer::new(res_x, res_y),
            finished_issuing: AtomicBool::new(false),
            started: Instant::now(),
        }
    }

    fn mark_issuing_finished(&self) {
        if self.finished_issuing.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            log::info!("task '{}': finished sending out all actions", self.scene_filename);
        }
    }

    fn write_outputs(&self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let srgb_path = format!("{}.ppm", self.output_base);
        let prophoto_path = format!("{}_prophoto16.ppm", self.output_base);
        if let Err(e) = self.image.write_srgb8_ppm(&srgb_path) {
            log::error!("failed to write {srgb_path}: {e}");
        }
        if let Err(e) = self.image.write_prophoto16_ppm(&prophoto_path) {
            log::error!("failed to write {prophoto_path}: {e}");
        }
        log::info!("task '{}' completed in {elapsed:.2}s", self.scene_filename);
    }
}

impl Task for TiledImageTask {
    fn next_action(&mut self) -> Option<(u32, Vec<u8>)> {
        let (gx, gy) = self.cursor?;
        let xstart = gx * self.tile_w;
        let ystart = gy * self.tile_h;
        // Clamp to resolution-1 (§4.13: "Both tasks clamp xend/yend to
        // resolution-1"); this is the partial-tile branch for a grid that
        // doesn't evenly divide the resolution, preserved even on the last
        // row/column where it may emit a tile smaller than tile_w/tile_h.
        let xend = (xstart + self.tile_w - 1).min(self.res_x - 1);
        let yend = (ystart + self.tile_h - 1).min(self.res_y - 1);

        let action_id = tiled_action_id(xstart, ystart);
        let mut payload = Vec::with_capacity(1 + crate::net::protocol::STRING_FIELD_LEN + 16);
        payload.push(0u8); // kind = 0: TiledImage
        write_fixed_scene_name(&mut payload, &self.scene_filename);
        payload.write_u32::<LittleEndian>(xstart).unwrap();
        payload.write_u32::<LittleEndian>(xend).unwrap();
        payload.write_u32::<LittleEndian>(ystart).unwrap();
        payload.write_u32::<LittleEndian>(yend).unwrap();

        self.issued.insert(action_id);
        self.issued_count += 1;

        let next_gx = gx + 1;
        self.cursor = if next_gx < self.grid_x {
            Some((next_gx, gy))
        } else if gy + 1 < self.grid_y {
            Some((0, gy + 1))
        } else {
            None
        };
        if self.cursor.is_none() {
            self.mark_issuing_finished();
        }

        Some((action_id, payload))
    }

    fn finished(&mut self, action_id: u32, results: &[u8]) -> Result<bool, TaskError> {
        if self.completed.contains(&action_id) {
            return Err(TaskError::DuplicateAction(action_id));
        }
        if !self.issued.remove(&action_id) {
            return Err(TaskError::UnknownAction(action_id));
        }

        let mut cursor = results;
        let xstart = cursor.read_u32::<LittleEndian>().unwrap_or(0);
        let xend = cursor.read_u32::<LittleEndian>().unwrap_or(0);
        let ystart = cursor.read_u32::<LittleEndian>().unwrap_or(0);
        let yend = cursor.read_u32::<LittleEndian>().unwrap_or(0);
        let width = xend.saturating_sub(xstart) + 1;
        let height = yend.saturating_sub(ystart) + 1;
        let colors = read_rise_colors(cursor, (width * height) as usize);

        let mut i = 0;
        for y in ystart..=yend {
            for x in xstart..=xend {
                if let Some(&c) = colors.get(i) {
                    self.image.set(x, y, c);
                }
                i += 1;
            }
        }

        self.completed.insert(action_id);
        if self.completed.len() == self.issued_count {
            // Mirrors the original's second "finished sending out" call
            // site: if every tile completed before `next_action` ever
            // observed an empty grid (unlikely but possible under unusual
            // scheduling), this is the one that actually flips the flag.
            self.mark_issuing_finished();
            if self.finished_issuing.load(Ordering::SeqCst) {
                self.write_outputs();
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// One action per frame; `finished` replaces the output buffer with a full
/// frame's worth of colors and writes it to disk immediately (§4.13).
pub struct AnimationTask {
    scene_filename: String,
    output_base: String,
    res_x: u32,
    res_y: u32,
    frame_count: u32,
    next_frame: u32,
    issued: HashSet<u32>,
    completed: HashSet<u32>,
}

impl AnimationTask {
    pub fn new(scene_filename: String, res_x: u32, res_y: u32, output_base: String, frame_count: u32) -> Self {
        Self {
            scene_filename,
            output_base,
            res_x,
            res_y,
            frame_count,
            next_frame: 0,
            issued: HashSet::new(),
            completed: HashSet::new(),
        }
    }
}

impl Task for AnimationTask {
    fn next_action(&mut self) -> Option<(u32, Vec<u8>)> {
        if self.next_frame >= self.frame_count {
            return None;
        }
        let frame = self.next_frame;
        self.next_frame += 1;

        let mut payload = Vec::with_capacity(1 + crate::net::protocol::STRING_FIELD_LEN + 4);
        payload.push(1u8); // kind = 1: Animation
        write_fixed_scene_name(&mut payload, &self.scene_filename);
        payload.write_u32::<LittleEndian>(frame).unwrap();

        self.issued.insert(frame);
        Some((frame, payload))
    }

    fn finished(&mut self, action_id: u32, results: &[u8]) -> Result<bool, TaskError> {
        if self.completed.contains(&action_id) {
            return Err(TaskError::DuplicateAction(action_id));
        }
        if !self.issued.remove(&action_id) {
            return Err(TaskError::UnknownAction(action_id));
        }

        let count = (self.res_x * self.res_y) as usize;
        let colors = read_rise_colors(results, count);
        let mut frame = ImageBuffer::new(self.res_x, self.res_y);
        for (i, c) in colors.into_iter().enumerate() {
            frame.set(i as u32 % self.res_x, i as u32 / self.res_x, c);
        }
        let path = format!("{}_{:05}_prophoto16.ppm", self.output_base, action_id);
        if let Err(e) = frame.write_prophoto16_ppm(&path) {
            log::error!("failed to write frame {action_id} to {path}: {e}");
        }

        self.completed.insert(action_id);
        Ok(self.completed.len() as u32 == self.frame_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiled_action_id_matches_spec_bit_layout() {
        assert_eq!(tiled_action_id(9, 3), (3u32 << 16) | 9);
    }

    #[test]
    fn tiled_task_issues_grid_cells_in_x_then_y_order_and_drains() {
        let mut task = TiledImageTask::new("scene.drise".to_string(), 10, 10, "/tmp/out".to_string(), 2, 2);
        let mut ids = vec![];
        while let Some((id, _)) = task.next_action() {
            ids.push(id);
        }
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[0], tiled_action_id(0, 0));
        assert_eq!(ids[1], tiled_action_id(5, 0));
        assert_eq!(ids[2], tiled_action_id(0, 5));
        assert_eq!(ids[3], tiled_action_id(5, 5));
    }

    #[test]
    fn tiled_task_rejects_unknown_and_duplicate_action_ids() {
        let mut task = TiledImageTask::new("scene.drise".to_string(), 4, 4, "/tmp/out2".to_string(), 1, 1);
        assert!(matches!(task.finished(999, &[]), Err(TaskError::UnknownAction(999))));

        let (id, _) = task.next_action().unwrap();
        let mut payload = Vec::new();
        payload.write_u32::<LittleEndian>(0).unwrap();
        payload.write_u32::<LittleEndian>(3).unwrap();
        payload.write_u32::<LittleEndian>(0).unwrap();
        payload.write_u32::<LittleEndian>(3).unwrap();
        for _ in 0..16 {
            payload.write_f32::<LittleEndian>(0.5).unwrap();
            payload.write_f32::<LittleEndian>(0.5).unwrap();
            payload.write_f32::<LittleEndian>(0.5).unwrap();
        }
        assert_eq!(task.finished(id, &payload), Ok(true));
        assert!(matches!(task.finished(id, &payload), Err(TaskError::DuplicateAction(_))));
    }

    #[test]
    fn animation_task_completes_after_all_frames() {
        let mut task = AnimationTask::new("scene.drise".to_string(), 2, 2, "/tmp/anim".to_string(), 2);
        let mut payload = Vec::new();
        for _ in 0..4 {
            payload.write_f32::<LittleEndian>(1.0).unwrap();
            payload.write_f32::<LittleEndian>(1.0).unwrap();
            payload.write_f32::<LittleEndian>(1.0).unwrap();
        }
        let (frame0, _) = task.next_action().unwrap();
        assert_eq!(task.finished(frame0, &payload), Ok(false));
        let (frame1, _) = task.next_action().unwrap();
        assert_eq!(task.finished(frame1, &payload), Ok(true));
        let _ = std::fs::remove_file("/tmp/anim_00000_prophoto16.ppm");
        let _ = std::fs::remove_file("/tmp/anim_00001_prophoto16.ppm");
    }
}
