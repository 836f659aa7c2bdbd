//! Motion program model and the contour -> G-code translation.
//!
//! # Program shape
//! ```text
//! G21 ; Set units to millimeters
//! G90 ; Set absolute positioning
//! G0 Z5 ; Move to safe height
//! G0 X0 Y0 ; Move to origin
//! ┌ per contour ───────────────
//! │ G0 Z5
//! │ G0 X.. Y..        first point
//! │ G1 Z-0.5 F800     plunge
//! │ G1 X.. Y.. F800   remaining points
//! │ G0 Z5             lift
//! └────────────────────────────
//! G0 Z5
//! G0 X0 Y0
//! M5
//! M30
//! ```
//! A program with zero contours is just the preamble and postamble.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::contour::Contour;

/// Per-call tool parameters (applied to every contour of a program).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Feed for engagement and tracing moves.
    pub feed_rate: f64,
    /// Z the tool travels at.
    pub safe_z: f64,
    /// Z the tool traces at.
    pub cutting_z: f64,
    /// Trace back to each contour's first point before lifting.
    pub close_contours: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        ToolSettings {
            feed_rate: 800.0,
            safe_z: 5.0,
            cutting_z: -0.5,
            close_contours: false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Commands
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    Z(f64),
    Xy(f64, f64),
    /// Machine origin, written as `X0 Y0`.
    Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineCode {
    Millimeters,
    Absolute,
    SpindleStop,
    ProgramEnd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Non-cutting positioning move.
    Rapid(Target),
    /// Cutting move at `feed`.
    Linear { target: Target, feed: f64 },
    Machine(MachineCode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub command: Command,
    pub comment: Option<&'static str>,
}

impl Line {
    fn plain(command: Command) -> Self {
        Line {
            command,
            comment: None,
        }
    }

    fn commented(command: Command, comment: &'static str) -> Self {
        Line {
            command,
            comment: Some(comment),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Z(z) => write!(f, "Z{z}"),
            Target::Xy(x, y) => write!(f, "X{x:.3} Y{y:.3}"),
            Target::Origin => f.write_str("X0 Y0"),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Rapid(target) => write!(f, "G0 {target}"),
            Command::Linear { target, feed } => write!(f, "G1 {target} F{feed}"),
            Command::Machine(MachineCode::Millimeters) => f.write_str("G21"),
            Command::Machine(MachineCode::Absolute) => f.write_str("G90"),
            Command::Machine(MachineCode::SpindleStop) => f.write_str("M5"),
            Command::Machine(MachineCode::ProgramEnd) => f.write_str("M30"),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.comment {
            Some(comment) => write!(f, "{} ; {comment}", self.command),
            None => write!(f, "{}", self.command),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Program
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolpathProgram {
    pub lines: Vec<Line>,
}

impl ToolpathProgram {
    /// Translates contours (canvas pixels, origin top-left) into a program
    /// in machine millimetres (origin bottom-left).
    pub fn from_contours(
        contours: &[Contour],
        canvas_height_px: u32,
        mm_per_px: f64,
        tool: &ToolSettings,
    ) -> Self {
        let to_machine = |x: i32, y: i32| -> Target {
            let (x_mm, y_mm) = pixel_to_mm(x, y, canvas_height_px, mm_per_px);
            Target::Xy(x_mm, y_mm)
        };
        let safe = Command::Rapid(Target::Z(tool.safe_z));

        let mut lines = vec![
            Line::commented(
                Command::Machine(MachineCode::Millimeters),
                "Set units to millimeters",
            ),
            Line::commented(
                Command::Machine(MachineCode::Absolute),
                "Set absolute positioning",
            ),
            Line::commented(safe, "Move to safe height"),
            Line::commented(Command::Rapid(Target::Origin), "Move to origin"),
        ];

        // Degenerate outlines never reach the machine.
        for contour in contours.iter().filter(|c| c.points.len() > 2) {
            let first = contour.points[0];
            lines.push(Line::plain(safe));
            lines.push(Line::plain(Command::Rapid(to_machine(first.x, first.y))));
            lines.push(Line::plain(Command::Linear {
                target: Target::Z(tool.cutting_z),
                feed: tool.feed_rate,
            }));
            for point in &contour.points[1..] {
                lines.push(Line::plain(Command::Linear {
                    target: to_machine(point.x, point.y),
                    feed: tool.feed_rate,
                }));
            }
            if tool.close_contours {
                lines.push(Line::plain(Command::Linear {
                    target: to_machine(first.x, first.y),
                    feed: tool.feed_rate,
                }));
            }
            lines.push(Line::plain(safe));
        }

        lines.push(Line::plain(safe));
        lines.push(Line::plain(Command::Rapid(Target::Origin)));
        lines.push(Line::plain(Command::Machine(MachineCode::SpindleStop)));
        lines.push(Line::plain(Command::Machine(MachineCode::ProgramEnd)));

        ToolpathProgram { lines }
    }

    /// Number of traced contour groups (one plunge each).
    pub fn contour_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l.command, Command::Linear { target: Target::Z(_), .. }))
            .count()
    }

    /// One command per line, newline-terminated.
    pub fn to_gcode(&self) -> String {
        let mut out = String::with_capacity(self.lines.len() * 24);
        for line in &self.lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }
}

/// `x_mm = x_px * s`, `y_mm = (H - y_px) * s`.
pub fn pixel_to_mm(x_px: i32, y_px: i32, canvas_height_px: u32, mm_per_px: f64) -> (f64, f64) {
    let x_mm = f64::from(x_px) * mm_per_px;
    let y_mm = (f64::from(canvas_height_px) - f64::from(y_px)) * mm_per_px;
    (x_mm, y_mm)
}
