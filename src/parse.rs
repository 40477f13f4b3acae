use crate::corpus::Frame;
use crate::error::{PieError, Result};
use crate::progress::{ProgressReporter, ProgressUpdate, report_progress};
use log::{debug, warn};
use quick_xml::de::from_str;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use tokio::task;

static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Parses a single FrameNet frame document.
pub fn parse_frame_str(xml_content: &str) -> Result<Frame> {
    from_str(xml_content).map_err(PieError::from)
}

/// Parses a single frame document using spawn_blocking.
pub async fn parse_frame_xml(xml_content: String) -> Result<Frame> {
    task::spawn_blocking(move || parse_frame_str(&xml_content)).await?
}

/// Reads and parses every frame file in `paths` on a blocking thread.
///
/// Files that fail to parse are skipped with a warning so one malformed frame does not
/// prevent the rest of the corpus from loading.
pub async fn parse_frame_files(
    paths: Vec<PathBuf>,
    reporter: ProgressReporter,
) -> Result<Vec<Frame>> {
    debug!("Parsing {} frame files (using spawn_blocking)...", paths.len());
    let frames = task::spawn_blocking(move || -> Result<Vec<Frame>> {
        let stage = "Parsing frames".to_string();
        let total = paths.len() as u64;
        report_progress(&reporter, ProgressUpdate::new_stage(stage.clone(), Some(total)));

        let mut frames = Vec::with_capacity(paths.len());
        for (idx, path) in paths.iter().enumerate() {
            let content = std::fs::read_to_string(path)?;
            match parse_frame_str(&content) {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!("Skipping unparsable frame file {:?}: {}", path, e),
            }
            report_progress(
                &reporter,
                ProgressUpdate::new(stage.clone(), idx as u64 + 1, Some(total), None),
            );
        }
        Ok(frames)
    })
    .await??;
    debug!("Successfully parsed {} frames.", frames.len());
    Ok(frames)
}

/// Removes FrameNet inline markup (`<def-root>`, `<fen>`, `<ex>`, ...) and collapses
/// whitespace.
pub fn strip_markup(text: &str) -> String {
    let without_tags = MARKUP_RE.replace_all(text, "");
    WHITESPACE_RE.replace_all(without_tags.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CoreType, FrameRelType};

    const ABANDONMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<?xml-stylesheet type="text/xsl" href="frame.xsl"?>
<frame cBy="ChW" name="Abandonment" ID="2031" xmlns="http://framenet.icsi.berkeley.edu">
    <definition>&lt;def-root&gt;An &lt;fen&gt;Agent&lt;/fen&gt; leaves behind a &lt;fen&gt;Theme&lt;/fen&gt;.&lt;/def-root&gt;</definition>
    <FE bgColor="FF0000" fgColor="FFFFFF" coreType="Core" abbrev="Age" name="Agent" ID="12338">
        <definition>The person who leaves.</definition>
        <semType name="Sentient" ID="5"/>
    </FE>
    <FE coreType="Core" abbrev="The" name="Theme" ID="12339">
        <definition>The thing left behind.</definition>
    </FE>
    <FE coreType="Peripheral" abbrev="Tim" name="Time" ID="12340"/>
    <frameRelation type="Inherits from">
        <relatedFrame ID="172">Intentionally_act</relatedFrame>
    </frameRelation>
    <frameRelation type="Is Inherited by"/>
    <frameRelation type="ReFraming Mapping"/>
    <lexUnit status="Created" POS="V" name="abandon.v" ID="14404" lemmaID="6254">
        <definition>COD: leave permanently.</definition>
        <sentenceCount annotated="9" total="9"/>
        <lexeme order="1" headword="false" breakBefore="false" POS="V" name="abandon"/>
    </lexUnit>
    <lexUnit status="Created" POS="N" name="abandonment.n" ID="14405" lemmaID="6255">
        <sentenceCount annotated="3" total="3"/>
    </lexUnit>
</frame>
"#;

    #[test]
    fn test_parse_frame_document() {
        let frame = parse_frame_str(ABANDONMENT_XML).expect("frame should parse");
        assert_eq!(frame.id, 2031);
        assert_eq!(frame.name, "Abandonment");
        assert_eq!(frame.frame_elements.len(), 3);
        assert_eq!(frame.frame_elements[2].core_type, CoreType::Peripheral);
        assert_eq!(frame.core_element_names(), vec!["Agent", "Theme"]);
        assert_eq!(frame.lexical_units.len(), 2);
        assert_eq!(frame.lexical_units[0].name, "abandon.v");
        assert_eq!(frame.lexical_units[1].name, "abandonment.n");
    }

    #[test]
    fn test_parse_relations_with_unknown_type() {
        let frame = parse_frame_str(ABANDONMENT_XML).unwrap();
        assert_eq!(frame.relations.len(), 3);
        assert_eq!(frame.relations[2].rel_type, FrameRelType::Other);
        let related: Vec<_> = frame.related_frames().collect();
        assert_eq!(related, vec![("Intentionally_act", FrameRelType::InheritsFrom)]);
    }

    #[test]
    fn test_strip_markup_from_definition() {
        let frame = parse_frame_str(ABANDONMENT_XML).unwrap();
        let definition = frame.definition.unwrap();
        assert!(definition.contains("<fen>"));
        assert_eq!(strip_markup(&definition), "An Agent leaves behind a Theme.");
    }

    #[tokio::test]
    async fn test_parse_frame_xml_async() {
        let frame = parse_frame_xml(ABANDONMENT_XML.to_string()).await.unwrap();
        assert_eq!(frame.name, "Abandonment");
    }

    #[tokio::test]
    async fn test_parse_frame_files_skips_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("Abandonment.xml");
        let bad = dir.path().join("Broken.xml");
        std::fs::write(&good, ABANDONMENT_XML).unwrap();
        std::fs::write(&bad, "<frame name=").unwrap();

        let frames = parse_frame_files(vec![good, bad], crate::progress::reporter(None))
            .await
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].name, "Abandonment");
    }
}
