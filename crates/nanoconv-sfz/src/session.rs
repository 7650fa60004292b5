//! One instrument conversion from SFZ text to a resolved tree, plus the
//! loop metadata edits on the samples it references.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hierarchy;
use crate::lexer;
use crate::normalizer::Normalizer;
use crate::resolver::{Resolver, SchemaViolation};
use crate::schema::{HeaderKind, Opcode, Schema};
use crate::tree::DocumentTree;
use crate::velocity::VelocityLayers;

/// Loop modes that make the sampler loop the sample.
const LOOPING_MODES: [&str; 2] = ["loop_continuous", "loop_sustain"];

/// Tunables of a conversion, read from the `[conversion]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Prefix applied to every sample path when the SFZ sets no
    /// `default_path` of its own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_path: Option<String>,
    /// Velocity layers kept per parent
    pub max_velocity_zones: usize,
    /// Regions kept per velocity layer
    pub max_regions_per_zone: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_path: None,
            max_velocity_zones: 3,
            max_regions_per_zone: 32,
        }
    }
}

/// Result of [`ConversionSession::resolve_str`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub tree: DocumentTree,
    /// Opcodes dropped because the target format cannot represent them
    pub violations: Vec<SchemaViolation>,
}

/// A loop to write into one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopEdit {
    /// Sample path as recorded in the tree
    pub sample: String,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug)]
pub struct LoopOutcome {
    pub edit: LoopEdit,
    pub result: Result<()>,
}

/// Supplies and stores sample file contents for a session.
///
/// Samples are addressed by the path recorded in the tree. Where the bytes
/// live, and whether an existing file may be replaced, is up to the store.
pub trait SampleStore {
    fn read(&mut self, sample: &str) -> anyhow::Result<Vec<u8>>;
    fn write(&mut self, sample: &str, bytes: Vec<u8>) -> anyhow::Result<()>;
}

pub struct ConversionSession {
    schema: &'static Schema,
    options: SessionOptions,
}

impl ConversionSession {
    pub fn new(schema: &'static Schema, options: SessionOptions) -> Self {
        Self { schema, options }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Run the whole pipeline on SFZ source text.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] for malformed text and [`Error::InvalidValue`] for an
    /// unusable key or transposition. Opcodes the target cannot carry are not
    /// errors; they are listed in [`Resolution::violations`].
    pub fn resolve_str(&self, content: &str) -> Result<Resolution> {
        self.resolve_blocks(lexer::lex(content)?)
    }

    /// Like [`resolve_str`](Self::resolve_str), replacing invalid UTF-8.
    pub fn resolve_bytes(&self, content: &[u8]) -> Result<Resolution> {
        self.resolve_blocks(lexer::lex_bytes(content)?)
    }

    fn resolve_blocks(&self, blocks: Vec<lexer::AttributeBlock>) -> Result<Resolution> {
        let mut tree = hierarchy::build(blocks);

        if let Some(default_path) = &self.options.default_path {
            let root = tree.node_mut(tree.root());
            if !root.contains(&Opcode::DefaultPath) {
                root.set(Opcode::DefaultPath, default_path.clone());
            }
        }

        let violations = Resolver::new(self.schema).resolve(&mut tree);
        Normalizer::new(self.schema).normalize(&mut tree)?;
        VelocityLayers::new(
            self.options.max_velocity_zones,
            self.options.max_regions_per_zone,
        )
        .apply(&mut tree);

        log::info!(
            "Resolved {} regions in {} velocity layers, dropped {} opcodes",
            tree.nodes_of_kind(HeaderKind::Region).len(),
            tree.nodes_of_kind(HeaderKind::Group).len(),
            violations.len()
        );
        Ok(Resolution { tree, violations })
    }

    /// Loops declared by looping regions with integer bounds.
    ///
    /// Every sample is listed once. When regions sharing a sample declare
    /// different loops, the first one is kept.
    pub fn loop_edits(&self, tree: &DocumentTree) -> Vec<LoopEdit> {
        let mut edits: Vec<LoopEdit> = Vec::new();

        for id in tree.nodes_of_kind(HeaderKind::Region) {
            let region = tree.node(id);
            let looping = region
                .get(&Opcode::LoopMode)
                .map_or(false, |mode| LOOPING_MODES.contains(&mode.trim()));
            if !looping {
                continue;
            }

            let bound = |opcode: &Opcode| region.get(opcode).and_then(|v| v.trim().parse::<u32>().ok());
            let (Some(sample), Some(start), Some(end)) = (
                region.get(&Opcode::Sample),
                bound(&Opcode::LoopStart),
                bound(&Opcode::LoopEnd),
            ) else {
                log::debug!("Looping region without a sample or integer bounds, skipped");
                continue;
            };

            match edits.iter().find(|edit| edit.sample == sample) {
                Some(kept) if (kept.start, kept.end) != (start, end) => log::warn!(
                    "{} is looped {}..{} and {}..{}, keeping the first loop",
                    sample,
                    kept.start,
                    kept.end,
                    start,
                    end
                ),
                Some(_) => {}
                None => edits.push(LoopEdit {
                    sample: sample.to_string(),
                    start,
                    end,
                }),
            }
        }

        edits
    }

    /// Write the loop of every [`LoopEdit`] into its sample.
    ///
    /// A failing sample is reported in its outcome; the remaining samples
    /// are still processed.
    pub fn apply_loops(&self, tree: &DocumentTree, store: &mut dyn SampleStore) -> Vec<LoopOutcome> {
        let outcomes: Vec<LoopOutcome> = self
            .loop_edits(tree)
            .into_iter()
            .map(|edit| {
                let result = apply_loop(&edit, store);
                match &result {
                    Ok(()) => log::debug!(
                        "Wrote loop {}..{} into {}",
                        edit.start,
                        edit.end,
                        edit.sample
                    ),
                    Err(err) => log::warn!("Could not loop {}: {}", edit.sample, err),
                }
                LoopOutcome { edit, result }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        log::info!(
            "Wrote {} sample loops, {} failed",
            outcomes.len() - failed,
            failed
        );
        outcomes
    }
}

fn apply_loop(edit: &LoopEdit, store: &mut dyn SampleStore) -> Result<()> {
    let sample_error = |err: anyhow::Error| Error::Sample {
        path: PathBuf::from(&edit.sample),
        source: err.into(),
    };

    let bytes = store.read(&edit.sample).map_err(sample_error)?;
    let looped = nanoconv_riff::add_loop_to_wave(&bytes, edit.start, edit.end)?;
    store.write(&edit.sample, looped).map_err(sample_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use nanoconv_riff::{DataChunk, FormatChunk, RiffChunk, RiffContainer};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        files: HashMap<String, Vec<u8>>,
    }

    impl SampleStore for MemoryStore {
        fn read(&mut self, sample: &str) -> anyhow::Result<Vec<u8>> {
            self.files
                .get(sample)
                .cloned()
                .ok_or_else(|| anyhow!("no such sample"))
        }

        fn write(&mut self, sample: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
            self.files.insert(sample.to_string(), bytes);
            Ok(())
        }
    }

    fn wave_bytes(frames: u16) -> Vec<u8> {
        let mut container = RiffContainer::wave();
        container.insert(RiffChunk::Format(FormatChunk::pcm(1, 44100, 16)));
        container.insert(RiffChunk::Data(DataChunk::new(
            (0..frames).flat_map(|s| s.to_le_bytes()).collect(),
        )));
        container.encode().unwrap()
    }

    fn session() -> ConversionSession {
        ConversionSession::new(Schema::standard(), SessionOptions::default())
    }

    const PIANO: &str = r#"
        // two velocity layers
        <control> default_path=samples/
        <global> volume=-3 polyphony=16 amp_veltrack=80
        <group> lovel=10 hivel=63
        <region> sample=soft.wav key=c4 transpose=2 loopmode=loop_continuous loopstart=10 loopend=90
        <group> lovel=64 hivel=100
        <region> sample=hard.wav lokey=a0 hikey=c8 pitch_keycenter=60 pan=-10
    "#;

    #[test]
    fn test_end_to_end_resolution() {
        let resolution = session().resolve_str(PIANO).unwrap();
        let tree = &resolution.tree;
        let schema = Schema::standard();

        assert_eq!(tree.depth(), 4);
        for id in tree.walk() {
            let node = tree.node(id);
            if node.is_leaf() {
                assert_eq!(tree.path_kinds(id), HeaderKind::ALL.to_vec());
            }
            for opcode in node.opcodes.keys() {
                assert!(schema.is_legal(node.kind, opcode), "{} on {}", opcode, node.kind);
            }
        }

        let regions = tree.nodes_of_kind(HeaderKind::Region);
        let soft = tree.node(regions[0]);
        assert_eq!(soft.get(&Opcode::Sample), Some("samples/soft.wav"));
        assert_eq!(soft.get(&Opcode::LoKey), Some("62"));
        assert_eq!(soft.get(&Opcode::PitchKeycenter), Some("62"));
        assert_eq!(soft.get(&Opcode::LoopMode), Some("loop_continuous"));
        let hard = tree.node(regions[1]);
        assert_eq!(hard.get(&Opcode::LoKey), Some("21"));
        assert_eq!(hard.get(&Opcode::HiKey), Some("108"));

        let groups = tree.nodes_of_kind(HeaderKind::Group);
        assert_eq!(tree.node(groups[0]).get(&Opcode::LoVel), Some("0"));
        assert_eq!(tree.node(groups[1]).get(&Opcode::HiVel), Some("127"));

        let global = tree.node(tree.nodes_of_kind(HeaderKind::Global)[0]);
        assert_eq!(global.get(&Opcode::Polyphony), Some("16"));

        let dropped: Vec<String> = resolution
            .violations
            .iter()
            .map(|v| v.opcode.to_string())
            .collect();
        assert_eq!(dropped, vec!["amp_veltrack", "amp_veltrack"]);
    }

    #[test]
    fn test_session_default_path() {
        let options = SessionOptions {
            default_path: Some("base".to_string()),
            ..SessionOptions::default()
        };
        let session = ConversionSession::new(Schema::standard(), options);

        let resolution = session.resolve_str("<region> sample=a.wav").unwrap();
        let tree = &resolution.tree;
        let region = tree.node(tree.nodes_of_kind(HeaderKind::Region)[0]);
        assert_eq!(region.get(&Opcode::Sample), Some("base/a.wav"));

        let resolution = session.resolve_str(PIANO).unwrap();
        let tree = &resolution.tree;
        let region = tree.node(tree.nodes_of_kind(HeaderKind::Region)[0]);
        assert_eq!(region.get(&Opcode::Sample), Some("samples/soft.wav"));
    }

    #[test]
    fn test_later_control_keeps_its_default_path() {
        let resolution = session()
            .resolve_str(
                "<control> default_path=a/\n<region> sample=x.wav\n\
                 <control> default_path=b/\n<region> sample=y.wav",
            )
            .unwrap();
        let tree = &resolution.tree;
        let samples: Vec<&str> = tree
            .nodes_of_kind(HeaderKind::Region)
            .into_iter()
            .filter_map(|id| tree.node(id).get(&Opcode::Sample))
            .collect();
        assert_eq!(samples, vec!["a/x.wav", "b/y.wav"]);
    }

    #[test]
    fn test_overflowing_keys_are_invalid_values() {
        for content in [
            "<region> sample=a.wav key=c999999999",
            "<region> sample=a.wav key=60 octave_offset=999999999",
            "<region> sample=a.wav key=127 transpose=1",
        ] {
            assert!(
                matches!(session().resolve_str(content), Err(Error::InvalidValue { .. })),
                "{}",
                content
            );
        }
    }

    #[test]
    fn test_parse_errors_abort() {
        assert!(matches!(
            session().resolve_str("volume=1\n<region> sample=a.wav"),
            Err(Error::Parse { line: 1, .. })
        ));
        assert!(matches!(
            session().resolve_str("<region> sample=a.wav key=x7"),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_loop_edits() {
        let content = "<region> sample=a.wav loop_mode=loop_sustain loop_start=1 loop_end=50
                       <region> sample=a.wav loop_mode=loop_sustain loop_start=1 loop_end=50
                       <region> sample=a.wav loop_mode=loop_sustain loop_start=2 loop_end=30
                       <region> sample=b.wav loop_mode=no_loop loop_start=1 loop_end=50
                       <region> sample=c.wav loop_mode=loop_continuous loop_start=1.5 loop_end=50
                       <region> sample=d.wav loopmode=loop_continuous loopstart=5 loopend=6";
        let session = session();
        let resolution = session.resolve_str(content).unwrap();

        assert_eq!(
            session.loop_edits(&resolution.tree),
            vec![
                LoopEdit {
                    sample: "a.wav".to_string(),
                    start: 1,
                    end: 50
                },
                LoopEdit {
                    sample: "d.wav".to_string(),
                    start: 5,
                    end: 6
                },
            ]
        );
    }

    #[test]
    fn test_apply_loops_continues_after_failure() {
        let content = "<region> sample=missing.wav loop_mode=loop_continuous loop_start=0 loop_end=10
                       <region> sample=broken.wav loop_mode=loop_continuous loop_start=0 loop_end=10
                       <region> sample=good.wav loop_mode=loop_continuous loop_start=4 loop_end=40";
        let session = session();
        let resolution = session.resolve_str(content).unwrap();

        let mut store = MemoryStore::default();
        store.files.insert("broken.wav".to_string(), b"not a wave".to_vec());
        store.files.insert("good.wav".to_string(), wave_bytes(64));

        let outcomes = session.apply_loops(&resolution.tree, &mut store);
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0].result, Err(Error::Sample { .. })));
        assert!(matches!(outcomes[1].result, Err(Error::Chunk(_))));
        assert!(outcomes[2].result.is_ok());

        let looped = nanoconv_riff::read_loop(&store.files["good.wav"]).unwrap().unwrap();
        assert_eq!((looped.start, looped.end), (4, 40));
    }
}
