use crc32fast::Hasher;

/// Generate a document seed from the survey title using CRC32
pub fn get_document_seed(title: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(b"survey://");
    hasher.update(title.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential id generator for nodes within a document
///
/// Ids are `{seed}-{n}` where the seed identifies the document and `n` is a
/// monotonically increasing counter. Ids are never reused within a document,
/// even for nodes that have been deleted and recreated by undo.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u32,
}

impl IdGenerator {
    pub fn new(title: &str) -> Self {
        Self {
            seed: get_document_seed(title),
            count: 0,
        }
    }

    pub fn from_seed(seed: String) -> Self {
        Self { seed, count: 0 }
    }

    /// Generate the next sequential id
    pub fn new_id(&mut self) -> String {
        self.count += 1;
        format!("{}-{}", self.seed, self.count)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Advance the counter past an existing id so freshly generated ids can
    /// never collide with ids loaded from JSON.
    pub fn bump_past(&mut self, id: &str) {
        if let Some(suffix) = id.strip_prefix(self.seed.as_str()).and_then(|s| s.strip_prefix('-')) {
            if let Ok(n) = suffix.parse::<u32>() {
                self.count = self.count.max(n);
            }
        }
    }
}
