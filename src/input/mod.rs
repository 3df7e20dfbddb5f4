//! Input simulation via ydotool
//!
//! ydotool injects events through uinput at the kernel level, so the same
//! commands work on X11 and Wayland sessions.

pub mod keys;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command as AsyncCommand;

use crate::backend::Point;
pub use keys::KeyChord;

/// Interval between pointer steps while dragging
const DRAG_STEP: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// ydotool button index (low nibble of the click code)
    fn index(self) -> u8 {
        match self {
            Self::Left => 0x0,
            Self::Right => 0x1,
            Self::Middle => 0x2,
        }
    }
}

/// Pointer and keyboard injection
#[async_trait]
pub trait InputBackend: Send + Sync {
    /// Move the pointer to absolute screen coordinates
    async fn move_to(&self, x: i32, y: i32) -> anyhow::Result<()>;

    /// Move to the coordinates and click once
    async fn click(&self, x: i32, y: i32, button: MouseButton) -> anyhow::Result<()>;

    /// Press the left button at `from`, glide to `to` over `duration`, release
    async fn drag(&self, from: Point, to: Point, duration: Duration) -> anyhow::Result<()>;

    async fn type_text(&self, text: &str) -> anyhow::Result<()>;

    async fn press_key(&self, chord: &KeyChord) -> anyhow::Result<()>;
}

/// [`InputBackend`] that shells out to ydotool
pub struct Ydotool {
    program: String,
    key_delay_ms: u32,
}

impl Ydotool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            key_delay_ms: 12,
        }
    }

    async fn run(&self, args: &[String]) -> anyhow::Result<()> {
        tracing::debug!("Executing {} {:?}", self.program, args);

        let output = AsyncCommand::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("failed to run {}: {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} {} failed ({}): {}",
                self.program,
                args.first().map(String::as_str).unwrap_or_default(),
                output.status,
                stderr.trim()
            );
        }

        Ok(())
    }

    async fn button(&self, code: u8) -> anyhow::Result<()> {
        self.run(&["click".to_string(), format!("{:#04X}", code)]).await
    }
}

fn mousemove_args(x: i32, y: i32) -> Vec<String> {
    vec![
        "mousemove".to_string(),
        "--absolute".to_string(),
        "-x".to_string(),
        x.to_string(),
        "-y".to_string(),
        y.to_string(),
    ]
}

/// Arguments for `ydotool key`: modifiers down, key down, key up, modifiers up
fn key_args(chord: &KeyChord) -> Vec<String> {
    let mut args = vec!["key".to_string()];
    args.extend(chord.modifiers.iter().map(|m| format!("{m}:1")));
    args.push(format!("{}:1", chord.key));
    args.push(format!("{}:0", chord.key));
    args.extend(chord.modifiers.iter().rev().map(|m| format!("{m}:0")));
    args
}

/// Intermediate pointer positions for a drag, ending exactly at `to`
fn drag_path(from: Point, to: Point, duration: Duration) -> Vec<Point> {
    let steps = (duration.as_millis() / DRAG_STEP.as_millis()).max(1) as i64;
    (1..=steps)
        .map(|i| Point {
            x: from.x + ((to.x - from.x) as i64 * i / steps) as i32,
            y: from.y + ((to.y - from.y) as i64 * i / steps) as i32,
        })
        .collect()
}

#[async_trait]
impl InputBackend for Ydotool {
    async fn move_to(&self, x: i32, y: i32) -> anyhow::Result<()> {
        self.run(&mousemove_args(x, y)).await
    }

    async fn click(&self, x: i32, y: i32, button: MouseButton) -> anyhow::Result<()> {
        self.move_to(x, y).await?;

        // Small delay to ensure move completes
        tokio::time::sleep(Duration::from_millis(10)).await;

        // 0xC0 = down + up
        self.button(0xC0 | button.index()).await
    }

    async fn drag(&self, from: Point, to: Point, duration: Duration) -> anyhow::Result<()> {
        self.move_to(from.x, from.y).await?;
        tokio::time::sleep(Duration::from_millis(10)).await;

        // 0x40 = down only
        self.button(0x40 | MouseButton::Left.index()).await?;

        let mut result = Ok(());
        for point in drag_path(from, to, duration) {
            result = self.move_to(point.x, point.y).await;
            if result.is_err() {
                break;
            }
            tokio::time::sleep(DRAG_STEP).await;
        }

        // Always release the button, even if a move failed; 0x80 = up only
        self.button(0x80 | MouseButton::Left.index()).await?;
        result
    }

    async fn type_text(&self, text: &str) -> anyhow::Result<()> {
        self.run(&[
            "type".to_string(),
            "--key-delay".to_string(),
            self.key_delay_ms.to_string(),
            "--".to_string(),
            text.to_string(),
        ])
        .await
    }

    async fn press_key(&self, chord: &KeyChord) -> anyhow::Result<()> {
        self.run(&key_args(chord)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_args_order() {
        let chord = KeyChord::parse("ctrl+shift+t").unwrap();
        assert_eq!(
            key_args(&chord),
            vec!["key", "29:1", "42:1", "20:1", "20:0", "42:0", "29:0"]
        );
    }

    #[test]
    fn test_drag_path_ends_at_target() {
        let from = Point { x: 0, y: 0 };
        let to = Point { x: 100, y: -50 };
        let path = drag_path(from, to, Duration::from_millis(100));
        assert_eq!(path.len(), 5);
        assert_eq!(path.last(), Some(&to));
        assert_eq!(path[0], Point { x: 20, y: -10 });
    }

    #[test]
    fn test_zero_duration_drag_is_one_step() {
        let to = Point { x: 10, y: 10 };
        let path = drag_path(Point { x: 0, y: 0 }, to, Duration::ZERO);
        assert_eq!(path, vec![to]);
    }

    #[test]
    fn test_mousemove_args() {
        assert_eq!(
            mousemove_args(5, 7),
            vec!["mousemove", "--absolute", "-x", "5", "-y", "7"]
        );
    }

    #[test]
    fn test_button_codes() {
        assert_eq!(format!("{:#04X}", 0xC0 | MouseButton::Right.index()), "0xC1");
    }
}
