use serde::Deserialize;

/// Outer wrapper of every *CUBE* API response body.
#[derive(Debug, Deserialize)]
pub(crate) struct CollectionEnvelope {
    pub collection: Collection,
}

/// *CUBE*'s HAL-like representation of a list of resources: each item holds a
/// flat list of name/value fields. Members not modeled here (`href`, `links`,
/// `template`) are ignored.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Collection {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Item {
    #[serde(default)]
    pub data: Vec<Field>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Field {
    pub name: String,
    pub value: serde_json::Value,
}

impl Collection {
    /// Value of the first field called `name`, scanning items then their
    /// fields in document order.
    pub fn first_value_of(&self, name: &str) -> Option<&serde_json::Value> {
        self.items
            .iter()
            .flat_map(|item| item.data.iter())
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    /// The first unsigned-numeric field called `id`, in document order.
    /// An `id` field with a non-numeric value is skipped.
    pub fn first_id(&self) -> Option<u32> {
        self.items
            .iter()
            .flat_map(|item| item.data.iter())
            .filter(|field| field.name == "id")
            .find_map(|field| field.value.as_u64())
            .and_then(|id| u32::try_from(id).ok())
    }

    /// Number of resources matching the query. Search views report matches
    /// beyond the returned page in `total`; when absent, the returned items
    /// are the whole answer.
    pub fn total(&self) -> u64 {
        self.total.unwrap_or(self.items.len() as u64)
    }
}
