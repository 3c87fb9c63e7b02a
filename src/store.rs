use std::path::Path;

use anyhow::{ensure, Context, Result};
use tantivy::{
    collector::TopDocs,
    doc,
    query::QueryParser,
    schema::{
        Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, FAST, STORED,
        STRING,
    },
    tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer},
    Index, IndexReader, TantivyDocument,
};
use tracing::info;

use crate::convert;

/// Fixed location of the persisted index.
pub const STORAGE_DIR: &str = "./storage";

/// Paragraphs are packed into chunks up to roughly this many characters.
const CHUNK_TARGET: usize = 1200;

const WRITER_MEMORY: usize = 15_000_000;

mod fields {
    pub const SOURCE: &str = "source";
    pub const CHUNK: &str = "chunk";
    pub const BODY: &str = "body";
}

/// Full-text retrieval index over document chunks.
pub struct DocIndex {
    index: Index,
    reader: IndexReader,
    schema: Schema,
}

/// One retrieved chunk with its BM25 score.
#[derive(Debug, Clone)]
pub struct Passage {
    pub score: f32,
    pub source: String,
    pub chunk: u64,
    pub body: String,
}

#[derive(Clone, Copy)]
struct SchemaFields {
    source: Field,
    chunk: Field,
    body: Field,
}

fn build_schema() -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();

    let source = builder.add_text_field(fields::SOURCE, STRING | STORED);
    let chunk = builder.add_u64_field(fields::CHUNK, STORED | FAST);

    let body_opts = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("en_stem")
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();
    let body = builder.add_text_field(fields::BODY, body_opts);

    let schema = builder.build();
    (schema, SchemaFields { source, chunk, body })
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register("en_stem", en_stem);
}

impl DocIndex {
    /// Open or create an index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let (schema, _) = build_schema();

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .with_context(|| format!("failed to open {}", dir.display()))?;
        let index = if Index::exists(&mmap_dir)? {
            Index::open(mmap_dir)?
        } else {
            Index::create(mmap_dir, schema.clone(), tantivy::IndexSettings::default())?
        };

        register_tokenizers(&index);
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            schema,
        })
    }

    /// Create an in-memory index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        let (schema, _) = build_schema();
        let index = Index::create_in_ram(schema.clone());
        register_tokenizers(&index);
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            schema,
        })
    }

    fn fields(&self) -> SchemaFields {
        let f = |name: &str| self.schema.get_field(name).unwrap();
        SchemaFields {
            source: f(fields::SOURCE),
            chunk: f(fields::CHUNK),
            body: f(fields::BODY),
        }
    }

    /// Index the chunks of one source document, replacing any previous
    /// chunks indexed under the same source.
    pub fn index_chunks(&self, source: &str, chunks: &[String]) -> Result<()> {
        let f = self.fields();
        let mut writer = self.index.writer(WRITER_MEMORY)?;

        let term = tantivy::Term::from_field_text(f.source, source);
        writer.delete_term(term);

        for (i, body) in chunks.iter().enumerate() {
            writer.add_document(doc!(
                f.source => source,
                f.chunk => i as u64,
                f.body => body.as_str(),
            ))?;
        }

        writer.commit()?;
        Ok(())
    }

    /// Retrieve the top `limit` chunks for a query, BM25-scored.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<Passage>> {
        let f = self.fields();
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let parser = QueryParser::for_index(&self.index, vec![f.body]);
        let (query, _errors) = parser.parse_query_lenient(query_str);

        // TopDocs panics on a zero limit.
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit.max(1)))?;

        let mut passages = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            passages.push(Passage {
                score,
                source: extract_text(&doc, f.source),
                chunk: extract_u64(&doc, f.chunk),
                body: extract_text(&doc, f.body),
            });
        }

        Ok(passages)
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn extract_u64(doc: &TantivyDocument, field: Field) -> u64 {
    doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0)
}

/// Convert a PDF into chunks and persist an index for them under `dir`.
/// Returns the number of chunks indexed.
pub fn build_index(input: &Path, dir: &Path) -> Result<usize> {
    let text = convert::pdf_to_text(input)?;
    let chunks = split_chunks(&text);
    ensure!(!chunks.is_empty(), "no extractable text in {}", input.display());

    let index = DocIndex::open(dir)?;
    let source = input.display().to_string();
    index.index_chunks(&source, &chunks)?;
    info!("indexed {} chunks from {}", chunks.len(), source);
    Ok(chunks.len())
}

/// Pack paragraphs into chunks of roughly `CHUNK_TARGET` characters. A single
/// paragraph longer than the target becomes its own oversized chunk.
pub fn split_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        if !current.is_empty() && current.len() + para.len() + 2 > CHUNK_TARGET {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_chunks("").is_empty());
        assert!(split_chunks("\n\n\n\n").is_empty());
    }

    #[test]
    fn short_paragraphs_pack_into_one_chunk() {
        let chunks = split_chunks("alpha\n\nbeta\n\ngamma");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "alpha\n\nbeta\n\ngamma");
    }

    #[test]
    fn long_text_splits_at_paragraph_bounds() {
        let para = "x".repeat(800);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = split_chunks(&text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= CHUNK_TARGET));
    }

    #[test]
    fn oversized_paragraph_is_kept_whole() {
        let para = "y".repeat(CHUNK_TARGET * 2);
        let chunks = split_chunks(&para);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), CHUNK_TARGET * 2);
    }

    #[test]
    fn index_and_search() {
        let idx = DocIndex::open_in_ram().unwrap();
        idx.index_chunks(
            "bench.pdf",
            &[
                "Password length must be at least fourteen characters".to_string(),
                "Audit logging should be enabled on all systems".to_string(),
            ],
        )
        .unwrap();

        let passages = idx.search("password length", 5).unwrap();
        assert!(!passages.is_empty());
        assert_eq!(passages[0].source, "bench.pdf");
        assert_eq!(passages[0].chunk, 0);
        assert!(passages[0].body.contains("fourteen"));
    }

    #[test]
    fn reindexing_a_source_replaces_its_chunks() {
        let idx = DocIndex::open_in_ram().unwrap();
        idx.index_chunks("a.pdf", &["old content about firewalls".to_string()])
            .unwrap();
        idx.index_chunks("a.pdf", &["new content about passwords".to_string()])
            .unwrap();

        assert!(idx.search("firewalls", 5).unwrap().is_empty());
        assert_eq!(idx.search("passwords", 5).unwrap().len(), 1);
    }

    #[test]
    fn stemming_matches_inflected_terms() {
        let idx = DocIndex::open_in_ram().unwrap();
        idx.index_chunks("a.pdf", &["logging and monitoring procedures".to_string()])
            .unwrap();
        assert!(!idx.search("log monitor", 5).unwrap().is_empty());
    }

    #[test]
    fn disk_persistence_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("storage");

        {
            let idx = DocIndex::open(&dir).unwrap();
            idx.index_chunks("a.pdf", &["persistent retrieval data".to_string()])
                .unwrap();
        }

        {
            let idx = DocIndex::open(&dir).unwrap();
            let passages = idx.search("persistent", 5).unwrap();
            assert_eq!(passages.len(), 1);
            assert_eq!(passages[0].source, "a.pdf");
        }
    }
}
