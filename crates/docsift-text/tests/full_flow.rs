use docsift_core::traits::LexicalIndex;
use docsift_core::types::{Document, DocumentMetadata, HitSource, SearchFilters, TimeRange};
use docsift_text::TantivyLexicalIndex;

fn doc(id: &str, content: &str, source: &str, ts: i64, tags: &[&str]) -> Document {
    let metadata = DocumentMetadata {
        source_type: Some(source.to_string()),
        timestamp: Some(ts),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    };
    Document::new(id, content, vec![], metadata)
}

fn corpus() -> Vec<Document> {
    vec![
        doc("d1", "quarterly invoice for the purchase order", "mail", 100, &["finance"]),
        doc("d2", "purchase order purchase order approval", "pdf", 200, &["finance", "approved"]),
        doc("d3", "team offsite agenda", "mail", 300, &[]),
        doc("d4", "invoice reminder", "mail", 400, &["finance"]),
    ]
}

fn index() -> TantivyLexicalIndex {
    let idx = TantivyLexicalIndex::in_memory().expect("index");
    idx.index(&corpus()).expect("index docs");
    idx
}

#[test]
fn keyword_search_ranks_by_relevance() {
    let idx = index();
    let hits = idx.search("purchase order", &SearchFilters::default(), 10).expect("search");
    assert_eq!(hits[0].id, "d2", "repeated terms score higher");
    assert!(hits.iter().all(|h| h.source == HitSource::Lexical));
    for w in hits.windows(2) {
        assert!(w[0].score > w[1].score || (w[0].score == w[1].score && w[0].id < w[1].id));
    }
}

#[test]
fn no_match_is_empty_not_error() {
    let idx = index();
    assert!(idx.search("nonexistentterm", &SearchFilters::default(), 10).expect("search").is_empty());
    assert!(idx.search("the and of", &SearchFilters::default(), 10).expect("stopwords only").is_empty());
}

#[test]
fn filters_restrict_results() {
    let idx = index();
    let by_type = SearchFilters { source_type: Some("mail".into()), ..Default::default() };
    let ids: Vec<_> = idx.search("invoice", &by_type, 10).unwrap().into_iter().map(|h| h.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"d1".to_string()) && ids.contains(&"d4".to_string()));

    let by_tag = SearchFilters { tags: ["approved".to_string()].into_iter().collect(), ..Default::default() };
    let ids: Vec<_> = idx.search("purchase", &by_tag, 10).unwrap().into_iter().map(|h| h.id).collect();
    assert_eq!(ids, vec!["d2"]);

    let by_time = SearchFilters { time_range: Some(TimeRange { start: Some(300), end: None }), ..Default::default() };
    let ids: Vec<_> = idx.search("invoice", &by_time, 10).unwrap().into_iter().map(|h| h.id).collect();
    assert_eq!(ids, vec!["d4"]);
}

#[test]
fn reindexing_an_id_replaces_it() {
    let idx = index();
    idx.index(&[doc("d3", "invoice archive", "mail", 300, &[])]).unwrap();
    assert_eq!(idx.num_docs(), 4);
    assert!(idx.search("offsite", &SearchFilters::default(), 10).unwrap().is_empty());
}

#[test]
fn equal_scores_keep_the_lowest_ids_at_the_cutoff() {
    let idx = TantivyLexicalIndex::in_memory().expect("index");
    let docs: Vec<Document> = ["zeta", "mid", "alpha"].iter().map(|id| doc(id, "invoice due", "mail", 1, &[])).collect();
    idx.index(&docs).expect("index docs");

    let all = idx.search("invoice", &SearchFilters::default(), 10).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].score == w[1].score));

    let ids = |limit| -> Vec<String> { idx.search("invoice", &SearchFilters::default(), limit).unwrap().into_iter().map(|h| h.id).collect() };
    assert_eq!(ids(1), vec!["alpha"]);
    assert_eq!(ids(2), vec!["alpha", "mid"]);
}

#[test]
fn on_disk_index_reopens() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("tantivy");
    {
        let idx = TantivyLexicalIndex::create_in_dir(&dir).expect("create");
        idx.index(&corpus()).expect("index");
    }
    let reopened = TantivyLexicalIndex::open_in_dir(&dir).expect("open");
    assert_eq!(reopened.num_docs(), 4);
    assert!(!reopened.search("agenda", &SearchFilters::default(), 5).unwrap().is_empty());
}
