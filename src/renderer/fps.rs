// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
// 显示帧率统计: 每满一秒输出一次这一秒内的帧数

use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct FpsCounter {
    count: u32,
    anchor: Instant,
    current: u32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::starting_at(Instant::now())
    }
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(anchor: Instant) -> Self {
        Self {
            count: 0,
            anchor,
            current: 0,
        }
    }

    pub fn tick(&mut self) -> Option<u32> {
        self.tick_at(Instant::now())
    }

    /// 计一帧; 距上次输出满一秒时返回这一秒的帧数并重新计数
    pub fn tick_at(&mut self, now: Instant) -> Option<u32> {
        self.count += 1;
        if now.saturating_duration_since(self.anchor) >= WINDOW {
            self.current = self.count;
            self.count = 0;
            self.anchor = now;
            return Some(self.current);
        }
        None
    }

    /// 最近一次输出的帧率, 第一秒内为0
    pub fn current(&self) -> u32 {
        self.current
    }
}
