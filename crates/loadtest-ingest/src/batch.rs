//! The fixed document batch sent with every ingest request.

use crate::error::IngestError;
use bytes::Bytes;
use serde::Serialize;

/// Documents repeated to fill a batch; each pair is emitted in this order.
const TEMPLATE_DOCUMENTS: [(&str, &str); 2] = [
    ("1", "This is a test document."),
    ("2", "Another test document."),
];

#[derive(Serialize)]
struct IngestDocument<'a> {
    timestamp: i64,
    id: &'a str,
    content: &'a str,
}

/// A newline-delimited JSON payload built once and shared by every request.
#[derive(Debug, Clone)]
pub struct DocumentBatch {
    payload: Bytes,
    doc_count: usize,
}

impl DocumentBatch {
    /// Build `pairs` copies of the two template documents, all stamped with
    /// `timestamp` (epoch seconds).
    pub fn generate(pairs: usize, timestamp: i64) -> Result<Self, IngestError> {
        if pairs == 0 {
            return Err(IngestError::InvalidPlan(
                "batch must contain at least one document pair".to_string(),
            ));
        }

        let lines = TEMPLATE_DOCUMENTS
            .iter()
            .map(|(id, content)| {
                serde_json::to_string(&IngestDocument {
                    timestamp,
                    id,
                    content,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let pair = lines.join("\n");

        let mut ndjson = String::with_capacity((pair.len() + 1) * pairs);
        for i in 0..pairs {
            if i > 0 {
                ndjson.push('\n');
            }
            ndjson.push_str(&pair);
        }

        Ok(Self {
            payload: Bytes::from(ndjson),
            doc_count: pairs * TEMPLATE_DOCUMENTS.len(),
        })
    }

    /// Cheap handle to the payload bytes.
    pub fn payload(&self) -> Bytes {
        self.payload.clone()
    }

    /// Serialized length `L` in bytes.
    pub fn len_bytes(&self) -> u64 {
        self.payload.len() as u64
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }
}
