use hashlink::LinkedHashMap;

/// Description of initial content, supplied from outside the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedEntry {
    File(String),
    Folder(SeedTree),
}

pub type SeedTree = LinkedHashMap<String, SeedEntry>;

impl SeedEntry {
    pub fn file(content: impl Into<String>) -> Self {
        SeedEntry::File(content.into())
    }

    pub fn folder<N: Into<String>>(entries: impl IntoIterator<Item = (N, SeedEntry)>) -> Self {
        SeedEntry::Folder(
            entries
                .into_iter()
                .map(|(name, entry)| (name.into(), entry))
                .collect(),
        )
    }

    pub fn empty_folder() -> Self {
        SeedEntry::Folder(LinkedHashMap::new())
    }
}
