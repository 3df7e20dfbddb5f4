//! OCR via the tesseract command-line engine
//!
//! The image is piped to `tesseract stdin stdout -l <lang> tsv` and the TSV
//! word rows are grouped into line fragments.

use std::process::Stdio;

use async_trait::async_trait;
use image::RgbaImage;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as AsyncCommand;

use super::{TextFragment, TextRecognizer};
use crate::core::window::Geometry;
use crate::screenshot::compress::encode_png;

/// TSV level of word rows
const WORD_LEVEL: u32 = 5;

pub struct TesseractCli {
    program: String,
    language: String,
}

impl TesseractCli {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractCli {
    async fn recognize(&self, image: &RgbaImage) -> anyhow::Result<Vec<TextFragment>> {
        let png = encode_png(image)?;

        let mut child = AsyncCommand::new(&self.program)
            .args(["stdin", "stdout", "-l", &self.language, "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("failed to run {}: {}", self.program, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&png).await?;
            // stdin is dropped here so tesseract sees EOF
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            anyhow::bail!(
                "{} failed ({}): {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

struct Word<'a> {
    line_key: (u32, u32, u32, u32),
    bounds: Geometry,
    confidence: f32,
    text: &'a str,
}

fn parse_word(row: &str) -> Option<Word<'_>> {
    let cols: Vec<&str> = row.splitn(12, '\t').collect();
    if cols.len() < 12 {
        return None;
    }

    let num = |i: usize| cols[i].trim().parse::<u32>().ok();
    if num(0)? != WORD_LEVEL {
        return None;
    }

    let confidence: f32 = cols[10].trim().parse().ok()?;
    let text = cols[11].trim();
    if confidence < 0.0 || text.is_empty() {
        return None;
    }

    Some(Word {
        line_key: (num(1)?, num(2)?, num(3)?, num(4)?),
        bounds: Geometry::new(num(6)? as i32, num(7)? as i32, num(8)?, num(9)?),
        confidence,
        text,
    })
}

/// Group TSV word rows into one fragment per text line
pub(crate) fn parse_tsv(tsv: &str) -> Vec<TextFragment> {
    let mut lines: Vec<((u32, u32, u32, u32), Vec<Word<'_>>)> = Vec::new();

    for word in tsv.lines().filter_map(parse_word) {
        match lines.last_mut() {
            Some((key, words)) if *key == word.line_key => words.push(word),
            _ => lines.push((word.line_key, vec![word])),
        }
    }

    lines
        .into_iter()
        .map(|(_, words)| {
            let left = words.iter().map(|w| w.bounds.x).min().unwrap_or(0);
            let top = words.iter().map(|w| w.bounds.y).min().unwrap_or(0);
            let right = words
                .iter()
                .map(|w| w.bounds.x + w.bounds.width as i32)
                .max()
                .unwrap_or(left);
            let bottom = words
                .iter()
                .map(|w| w.bounds.y + w.bounds.height as i32)
                .max()
                .unwrap_or(top);
            let confidence = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;

            TextFragment {
                text: words.iter().map(|w| w.text).collect::<Vec<_>>().join(" "),
                bounds: Geometry::new(left, top, (right - left) as u32, (bottom - top) as u32),
                confidence: (confidence / 100.0).clamp(0.0, 1.0),
            }
        })
        .collect()
}
