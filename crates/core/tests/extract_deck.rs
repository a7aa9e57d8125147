mod common;

use auditor_core::extractor::extract_deck;
use auditor_core::AuditError;
use common::*;
use std::io::Write;

#[test]
fn slides_come_back_in_presentation_order() {
    let dir = tempfile::tempdir().unwrap();
    let deck = three_slide_deck(dir.path());

    let slides = extract_deck(&deck).unwrap();
    assert_eq!(slides.len(), 3);
    assert_eq!(
        slides.iter().map(|s| s.slide_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(slides[0].text, "Our Platform\nBuilt for every team");
    assert!(slides[0].images.is_empty());
    assert_eq!(
        slides[1].text,
        "Revenue growth\n| Region | Q1 | Q2 |\n| --- | --- | --- |\n| EMEA | 1.2 | 1.4 |\n| APAC | 0.9 | 1.1 |"
    );
    assert_eq!(slides[1].images.len(), 1);
    assert_eq!(slides[1].images[0].mime, "image/png");
    assert_eq!(slides[1].images[0].name, "ppt/media/image1.png");
    assert_eq!(slides[1].images[0].data, PNG_1X1);
}

#[test]
fn short_rows_and_empty_cells_are_padded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.pptx");
    write_deck(
        &path,
        &[SlideFixture::new().table(&[&["Plan", "Seats", "Price"], &["Team", ""], &["Enterprise", "500", "Call us"]])],
    );

    let slides = extract_deck(&path).unwrap();
    assert_eq!(
        slides[0].text,
        "| Plan | Seats | Price |\n| --- | --- | --- |\n| Team |  |  |\n| Enterprise | 500 | Call us |"
    );
}

#[test]
fn vector_images_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logo.pptx");
    write_deck(
        &path,
        &[SlideFixture::new()
            .text(&["Brand"])
            .image("logo.svg", b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>")
            .image("photo.png", PNG_1X1)],
    );

    let slides = extract_deck(&path).unwrap();
    assert_eq!(slides[0].images.len(), 1);
    assert_eq!(slides[0].images[0].name, "ppt/media/photo.png");
}

#[test]
fn missing_slide_part_fails_the_deck() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.pptx");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    let opts = zip::write::FileOptions::default();
    zip.start_file("ppt/presentation.xml", opts).unwrap();
    zip.write_all(
        br#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst></p:presentation>"#,
    )
    .unwrap();
    zip.start_file("ppt/_rels/presentation.xml.rels", opts).unwrap();
    zip.write_all(br#"<Relationships><Relationship Id="rId2" Target="slides/slide1.xml"/></Relationships>"#)
        .unwrap();
    zip.finish().unwrap();

    let err = extract_deck(&path).unwrap_err();
    match err {
        AuditError::DocumentOpen { reason, .. } => assert!(reason.contains("ppt/slides/slide1.xml")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unresolvable_slide_id_fails_the_deck() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dangling.pptx");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    let opts = zip::write::FileOptions::default();
    zip.start_file("ppt/presentation.xml", opts).unwrap();
    zip.write_all(
        br#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId9"/><p:sldId id="257" r:id="rId2"/></p:sldIdLst></p:presentation>"#,
    )
    .unwrap();
    zip.start_file("ppt/_rels/presentation.xml.rels", opts).unwrap();
    zip.write_all(br#"<Relationships><Relationship Id="rId2" Target="slides/slide1.xml"/></Relationships>"#)
        .unwrap();
    zip.start_file("ppt/slides/slide1.xml", opts).unwrap();
    zip.write_all(
        br#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>Second</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
    )
    .unwrap();
    zip.finish().unwrap();

    let err = extract_deck(&path).unwrap_err();
    match err {
        AuditError::DocumentOpen { reason, .. } => assert!(reason.contains("rId9")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn missing_file_is_document_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = extract_deck(&dir.path().join("nope.pptx")).unwrap_err();
    assert!(matches!(err, AuditError::DocumentOpen { .. }));
}
