//! Output pipeline: PDF chapters through aggregation to the written document

use kb_harvester::config::{SourceConfig, SourceKind};
use kb_harvester::extract::{sections_to_items, split_sections};
use kb_harvester::output::write_document;
use kb_harvester::{Aggregator, CanonicalItem, ContentType, OutputDocument};

fn pdf_source(name: &str) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        origin: format!("{}.pdf", name),
        kind: SourceKind::Pdf,
        content_type: None,
        scope_prefix: None,
        crawl: false,
        author: Some("Book Author".to_string()),
        plugin: None,
    }
}

/// Text shaped like a PDF extraction: front matter, a contents page, then chapters
fn book_text(chapters: usize) -> String {
    let mut text = String::from("Sorting Things Out\nSecond Edition\n\nTable of Contents\n");
    for n in 1..=chapters {
        text.push_str(&format!("Chapter {}  Topic number {}  {}\n", n, n, 3 + n * 12));
    }
    for n in 1..=chapters {
        text.push_str(&format!(
            "\n\nChapter {}: Topic number {}\n\nThis chapter introduces topic {} and works through the \
             reasoning behind it with several small examples. Each example builds on the last, and \
             the chapter ends with practice problems.\n\nA closing paragraph summarizes topic {}.\n",
            n, n, n, n
        ));
    }
    text
}

#[test]
fn test_eight_chapter_pdf_yields_eight_book_items() {
    let source = pdf_source("sorting_things_out");
    let items = sections_to_items(&source, split_sections(&book_text(8), "Sorting Things Out"));

    assert_eq!(items.len(), 8);
    for (i, item) in items.iter().enumerate() {
        assert_eq!(item.title, format!("Chapter {}: Topic number {}", i + 1, i + 1));
        assert_eq!(item.content_type, ContentType::Book);
        assert_eq!(item.source_url, "");
        assert_eq!(item.author, "Book Author");
        assert!(item.content.contains(&format!("introduces topic {}", i + 1)));
    }
}

#[test]
fn test_document_written_in_source_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("nested").join("knowledge_base.json");

    let aggregator = Aggregator::new(
        "aline123",
        vec!["blog".to_string(), "book".to_string()],
        false,
    );
    let book = sections_to_items(&pdf_source("book"), split_sections(&book_text(2), "Book"));
    // Book finishes first but is listed second
    aggregator.add("book", book);
    aggregator.add(
        "blog",
        vec![
            CanonicalItem::new("Post", "Body text", ContentType::Blog)
                .with_source_url("https://example.com/blog/post"),
            CanonicalItem::new("", "Untitled pages are dropped", ContentType::Blog),
        ],
    );

    let document = aggregator.finalize();
    write_document(&document, &output).unwrap();

    let written: OutputDocument =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written, document);
    assert_eq!(written.team_id, "aline123");
    let titles: Vec<&str> = written.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Post", "Chapter 1: Topic number 1", "Chapter 2: Topic number 2"]
    );
    assert_eq!(aggregator.rejected(), 1);

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let first = &raw["items"][1];
    assert_eq!(first["content_type"], "book");
    assert_eq!(first["source_url"], "");
    assert_eq!(first["user_id"], "");
}
