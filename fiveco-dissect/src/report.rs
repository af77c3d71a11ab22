//! Report output
//!
//! Writes one entry per delivery (summary line, and optionally the decode
//! trees) followed by session statistics gathered from dissector events.

use std::io::Write;

use fiveco_engine::{DissectedFrame, Dissection, DissectorEvent, EngineError};
use serde::Serialize;

use crate::script::ScriptDelivery;
use crate::settings::OutputFormat;

/// Counters built from drained dissector events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub frames: usize,
    pub replayed: usize,
    pub rejected: usize,
    pub checksum_errors: usize,
    pub matched: usize,
    pub duplicates: usize,
    pub unmatched: usize,
    pub resets: usize,
}

impl Stats {
    /// Account for a batch of events
    pub fn record(&mut self, events: &[DissectorEvent]) {
        for event in events {
            match event {
                DissectorEvent::FrameDecoded { replay, .. } => {
                    self.frames += 1;
                    if *replay {
                        self.replayed += 1;
                    }
                }
                DissectorEvent::DeliveryRejected { .. } => self.rejected += 1,
                DissectorEvent::ChecksumMismatch { .. } => self.checksum_errors += 1,
                DissectorEvent::AnswerMatched { .. } => self.matched += 1,
                DissectorEvent::DuplicateAnswer { .. } => self.duplicates += 1,
                DissectorEvent::UnmatchedAnswer { .. } => self.unmatched += 1,
                DissectorEvent::SessionReset => self.resets += 1,
            }
        }
    }
}

#[derive(Serialize)]
struct JsonDelivery {
    packet: u64,
    flow: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    frames: Vec<DissectedFrame>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    deliveries: &'a [JsonDelivery],
    stats: Stats,
}

/// Report writer
pub struct Report<W: Write> {
    out: W,
    format: OutputFormat,
    show_trees: bool,
    json: Vec<JsonDelivery>,
}

impl<W: Write> Report<W> {
    /// Create a report writing to `out`
    pub fn new(out: W, format: OutputFormat, show_trees: bool) -> Self {
        Self {
            out,
            format,
            show_trees,
            json: Vec::new(),
        }
    }

    /// Report a dissected delivery
    pub fn delivery(
        &mut self,
        delivery: &ScriptDelivery,
        dissection: Dissection,
    ) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                writeln!(
                    self.out,
                    "#{} flow {}: {}",
                    delivery.packet,
                    delivery.flow.as_u64(),
                    dissection.info()
                )?;
                if self.show_trees {
                    for frame in &dissection.frames {
                        write!(self.out, "{}", frame.tree().render())?;
                    }
                    writeln!(self.out)?;
                }
            }
            OutputFormat::Json => self.json.push(JsonDelivery {
                packet: delivery.packet,
                flow: delivery.flow.as_u64(),
                info: Some(dissection.info()),
                error: None,
                frames: if self.show_trees {
                    dissection.frames
                } else {
                    Vec::new()
                },
            }),
        }
        Ok(())
    }

    /// Report a rejected delivery
    pub fn rejected(&mut self, delivery: &ScriptDelivery, error: &EngineError) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(
                self.out,
                "#{} flow {}: not FiveCo legacy traffic ({})",
                delivery.packet,
                delivery.flow.as_u64(),
                error
            ),
            OutputFormat::Json => {
                self.json.push(JsonDelivery {
                    packet: delivery.packet,
                    flow: delivery.flow.as_u64(),
                    info: None,
                    error: Some(error.to_string()),
                    frames: Vec::new(),
                });
                Ok(())
            }
        }
    }

    /// Write the statistics and flush
    pub fn finish(mut self, stats: &Stats) -> anyhow::Result<W> {
        match self.format {
            OutputFormat::Text => {
                writeln!(
                    self.out,
                    "{} frames ({} replayed), {} rejected deliveries, {} bad checksums",
                    stats.frames, stats.replayed, stats.rejected, stats.checksum_errors
                )?;
                writeln!(
                    self.out,
                    "{} answers matched, {} duplicate, {} without request",
                    stats.matched, stats.duplicates, stats.unmatched
                )?;
            }
            OutputFormat::Json => {
                let report = JsonReport {
                    deliveries: &self.json,
                    stats: *stats,
                };
                serde_json::to_writer_pretty(&mut self.out, &report)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()?;
        Ok(self.out)
    }
}
