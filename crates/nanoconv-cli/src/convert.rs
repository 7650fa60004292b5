//! The `convert` command: resolve an instrument and rebuild it, samples
//! included, in a destination directory.

use crate::error::Error;
use crate::store::{ConfirmOverwrite, FileSampleStore, OverwritePolicy};
use anyhow::{Context, Result};
use nanoconv_sfz::{ConversionSession, HeaderKind, Opcode};
use std::fs;
use std::path::{Path, PathBuf};

/// Summary of one converted instrument
#[derive(Debug)]
pub struct ConversionReport {
    /// The resolved instrument file
    pub instrument: PathBuf,
    /// Samples written to the destination, looped ones included
    pub samples_written: usize,
    pub loops_written: usize,
    /// One message per sample that could not be written
    pub failures: Vec<String>,
    /// One message per loop that could not be added; the sample was copied
    /// unchanged instead
    pub loop_failures: Vec<String>,
    /// Opcodes the target format could not carry
    pub dropped_opcodes: usize,
}

/// Convert `source` into `destination`.
///
/// Samples are looked up relative to the source file and copied to the
/// same relative location below `destination`. Samples of looping regions
/// get a `smpl` chunk on the way; when the loop cannot be added the sample
/// is copied as it is. A failing sample is reported and the others are
/// still written.
pub fn convert(
    source: &Path,
    destination: &Path,
    session: &ConversionSession,
    policy: OverwritePolicy,
    confirm: Option<ConfirmOverwrite>,
) -> Result<ConversionReport> {
    let source_dir = source
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    fs::create_dir_all(destination)
        .with_context(|| format!("Failed to create {}", destination.display()))?;
    if fs::canonicalize(source_dir)? == fs::canonicalize(destination)? {
        return Err(Error::SameDirectory(destination.to_path_buf()).into());
    }

    let content =
        fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    let resolution = session
        .resolve_bytes(&content)
        .with_context(|| format!("Failed to resolve {}", source.display()))?;
    let tree = &resolution.tree;
    for violation in &resolution.violations {
        log::info!("Dropped unsupported opcode {}", violation);
    }

    let mut store = FileSampleStore::new(source_dir, destination, policy);
    if let Some(confirm) = confirm {
        store = store.with_confirm(confirm);
    }

    let looped: Vec<String> = session
        .loop_edits(tree)
        .into_iter()
        .map(|edit| edit.sample)
        .collect();
    let mut failures = Vec::new();
    let mut copied: Vec<&str> = Vec::new();

    for region in tree.nodes_of_kind(HeaderKind::Region) {
        let Some(sample) = tree.node(region).get(&Opcode::Sample) else {
            continue;
        };
        if copied.contains(&sample) || looped.iter().any(|s| s == sample) {
            continue;
        }
        copied.push(sample);
        if let Err(err) = store.copy_sample(sample) {
            log::warn!("Could not copy {}: {:#}", sample, err);
            failures.push(format!("{}: {:#}", sample, err));
        }
    }

    let outcomes = session.apply_loops(tree, &mut store);
    let mut loops_written = 0;
    let mut loop_failures = Vec::new();
    for outcome in outcomes {
        let sample = outcome.edit.sample;
        match outcome.result {
            Ok(()) => loops_written += 1,
            Err(err) => {
                loop_failures.push(format!("{}: {}", sample, err));
                if let Err(err) = store.copy_sample(&sample) {
                    log::warn!("Could not copy {}: {:#}", sample, err);
                    failures.push(format!("{}: {:#}", sample, err));
                }
            }
        }
    }
    let samples_written = store.written();

    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("instrument");
    let name = format!("{}.sfz", stem);
    store.write_file(&name, tree.to_string().as_bytes())?;

    Ok(ConversionReport {
        instrument: store.destination_path(&name)?,
        samples_written,
        loops_written,
        failures,
        loop_failures,
        dropped_opcodes: resolution.violations.len(),
    })
}
