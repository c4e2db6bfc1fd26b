/// Full-text search over guides and their steps.
///
/// Backed by an in-RAM tantivy index. Each guide contributes one guide-level
/// document keyed by its slug and one document per step keyed `slug/stepId`.
/// Neither slugs nor step ids contain `/`, so the two kinds never collide.
/// Query terms are prefix-matched against indexed words, so `inst` finds
/// `install`.
///
/// The index is built at most once until [`SearchIndex::reset`] is called.
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer, TokenStream};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, error, info};

use crate::error::GuideError;
use crate::model::{Guide, SearchResult};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Score reported on every result; the prefix queries do not produce a
/// meaningful relevance value.
pub const PLACEHOLDER_SCORE: f32 = 1.0;

const TOKENIZER_NAME: &str = "guide_text";
const HEADING_BOOST: f32 = 2.0;
const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Debug, Clone, Copy)]
struct SearchFields {
    /// Document key: `slug` or `slug/stepId`.
    id: Field,
    /// Guide title for guide documents, step title for step documents.
    heading: Field,
    /// Title plus description, or step title plus step content.
    body: Field,
    slug: Field,
    title: Field,
    description: Field,
    step_id: Field,
    step_title: Field,
}

impl SearchFields {
    fn build_schema() -> (Schema, Self) {
        let mut builder = Schema::builder();

        let text_options = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(TOKENIZER_NAME)
                .set_index_option(IndexRecordOption::WithFreqs),
        );

        let fields = Self {
            id: builder.add_text_field("id", STRING | STORED),
            heading: builder.add_text_field("heading", text_options.clone()),
            body: builder.add_text_field("body", text_options),
            slug: builder.add_text_field("slug", STORED),
            title: builder.add_text_field("title", STORED),
            description: builder.add_text_field("description", STORED),
            step_id: builder.add_text_field("step_id", STORED),
            step_title: builder.add_text_field("step_title", STORED),
        };

        (builder.build(), fields)
    }
}

fn guide_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .build()
}

pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: SearchFields,
    analyzer: TextAnalyzer,
    built: AtomicBool,
    /// Held for the whole build so concurrent callers build once.
    build_lock: Mutex<()>,
}

impl SearchIndex {
    pub fn new() -> Result<Self, GuideError> {
        let (schema, fields) = SearchFields::build_schema();
        let index = Index::create_in_ram(schema);
        let analyzer = guide_analyzer();
        index.tokenizers().register(TOKENIZER_NAME, analyzer.clone());

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            fields,
            analyzer,
            built: AtomicBool::new(false),
            build_lock: Mutex::new(()),
        })
    }

    pub fn is_built(&self) -> bool {
        self.built.load(Ordering::Acquire)
    }

    /// Number of documents visible to searches.
    pub fn document_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Populate the index from `guides` unless it is already built.
    ///
    /// Replaces whatever the index held before. On failure the error is
    /// logged and the index stays unbuilt.
    pub fn build(&self, guides: &[Guide]) {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_built() {
            debug!("search index already built, skipping");
            return;
        }

        match self.populate(guides) {
            Ok(documents) => {
                self.built.store(true, Ordering::Release);
                info!(guides = guides.len(), documents, "search index built");
            }
            Err(e) => error!(error = %e, "failed to build search index"),
        }
    }

    /// Clear the built flag so the next [`build`](Self::build) repopulates.
    pub fn reset(&self) {
        self.built.store(false, Ordering::Release);
        debug!("search index reset");
    }

    fn populate(&self, guides: &[Guide]) -> Result<usize, GuideError> {
        let f = self.fields;
        let mut writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        writer.delete_all_documents()?;

        let mut documents = 0;
        for guide in guides {
            let title = guide.metadata.title.as_str();
            let description = guide.metadata.description.as_str();

            let mut doc = TantivyDocument::default();
            doc.add_text(f.id, &guide.slug);
            doc.add_text(f.heading, title);
            doc.add_text(f.body, format!("{title} {description}"));
            doc.add_text(f.slug, &guide.slug);
            doc.add_text(f.title, title);
            doc.add_text(f.description, description);
            writer.delete_term(Term::from_field_text(f.id, &guide.slug));
            writer.add_document(doc)?;
            documents += 1;

            for step in &guide.steps {
                let key = format!("{}/{}", guide.slug, step.id);
                let mut doc = TantivyDocument::default();
                doc.add_text(f.id, &key);
                doc.add_text(f.heading, &step.title);
                doc.add_text(f.body, format!("{} {}", step.title, step.content));
                doc.add_text(f.slug, &guide.slug);
                doc.add_text(f.title, title);
                doc.add_text(f.description, description);
                doc.add_text(f.step_id, &step.id);
                doc.add_text(f.step_title, &step.title);
                writer.delete_term(Term::from_field_text(f.id, &key));
                writer.add_document(doc)?;
                documents += 1;
            }
        }

        writer.commit()?;
        self.reader.reload()?;
        Ok(documents)
    }

    /// Search guides and steps.
    ///
    /// Blank queries return nothing without touching the index. Results are
    /// deduplicated by `(slug, stepId)` keeping the first hit, then cut to
    /// `limit`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        if query.trim().is_empty() || limit == 0 {
            return Vec::new();
        }

        match self.run_search(query, limit) {
            Ok(results) => results,
            Err(e) => {
                error!(query, error = %e, "search failed");
                Vec::new()
            }
        }
    }

    fn query_terms(&self, query: &str) -> Vec<String> {
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(query);
        let mut seen = HashSet::new();
        let mut terms = Vec::new();
        stream.process(&mut |token| {
            if seen.insert(token.text.clone()) {
                terms.push(token.text.clone());
            }
        });
        terms
    }

    fn build_query(&self, terms: &[String]) -> BooleanQuery {
        let f = self.fields;
        let clauses: Vec<(Occur, Box<dyn Query>)> = terms
            .iter()
            .map(|term| {
                let heading = FuzzyTermQuery::new_prefix(Term::from_field_text(f.heading, term), 0, true);
                let body = FuzzyTermQuery::new_prefix(Term::from_field_text(f.body, term), 0, true);
                let either: Vec<(Occur, Box<dyn Query>)> = vec![
                    (
                        Occur::Should,
                        Box::new(BoostQuery::new(Box::new(heading), HEADING_BOOST)),
                    ),
                    (Occur::Should, Box::new(body)),
                ];
                (Occur::Must, Box::new(BooleanQuery::new(either)) as Box<dyn Query>)
            })
            .collect();
        BooleanQuery::new(clauses)
    }

    fn run_search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, GuideError> {
        let terms = self.query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let available = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX);
        if available == 0 {
            return Ok(Vec::new());
        }
        // The collector preallocates its capacity; bound it by the corpus.
        let fetch = limit.min(available).saturating_mul(2);
        let top_docs = searcher.search(&self.build_query(&terms), &TopDocs::with_limit(fetch))?;

        let f = self.fields;
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut results = Vec::new();

        for (_score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let text = |field: Field| {
                doc.get_first(field)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            };

            let slug = text(f.slug).unwrap_or_default();
            let step_id = text(f.step_id);
            if !seen.insert((slug.clone(), step_id.clone().unwrap_or_default())) {
                continue;
            }

            results.push(SearchResult {
                slug,
                title: text(f.title).unwrap_or_default(),
                description: text(f.description).unwrap_or_default(),
                step_id,
                step_title: text(f.step_title),
                score: PLACEHOLDER_SCORE,
            });
            if results.len() == limit {
                break;
            }
        }

        debug!(query, hits = results.len(), "search complete");
        Ok(results)
    }
}
