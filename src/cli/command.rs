use std::path::PathBuf;

/// One CLI invocation, independent of how the arguments were parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Analyze {
        file: PathBuf,
        delimiter: Option<String>,
        encoding: Option<String>,
        has_header: Option<bool>,
    },
    Import {
        file: PathBuf,
        name: String,
        description: Option<String>,
        delimiter: Option<String>,
        encoding: Option<String>,
        has_header: Option<bool>,
        /// Re-import into this failed dataset.
        retry: Option<u64>,
    },
    List {
        page: Option<u64>,
        per_page: Option<u64>,
        search: Option<String>,
        status: Option<String>,
    },
    Preview {
        dataset_id: u64,
        limit: Option<u64>,
    },
    Delete {
        dataset_id: u64,
    },
    Restore {
        dataset_id: u64,
    },
    Purge {
        dataset_id: u64,
    },
    Rename {
        dataset_id: u64,
        name: Option<String>,
        description: Option<String>,
    },
}
