//! Stream registration: bind configured stream names to live input links,
//! resolve key ordinals and comparators, and build the merged output layout.

use std::collections::{HashMap, HashSet};

use rowflow_types::join::split_key_list;
use rowflow_types::{JoinType, MergeJoinSettings, Row, RowLayout, StepError};

use super::compare::{KeyComparator, KeyPartComparator};
use crate::stream::{InputLink, RowInput};

/// Everything the step owns about one registered input stream.
pub(crate) struct StreamState {
    pub(crate) name: String,
    pub(crate) layout: RowLayout,
    pub(crate) key_ordinals: Vec<usize>,
    input: Box<dyn RowInput>,
    pub(crate) exhausted: bool,
    pub(crate) rows_read: u64,
}

impl StreamState {
    /// Pull the next row, tracking the read count and end of stream.
    ///
    /// A row whose width differs from the stream's layout is a data error.
    pub(crate) fn pull(&mut self) -> Result<Option<Row>, StepError> {
        let next = self.input.pull()?;
        match &next {
            Some(row) if row.len() != self.layout.len() => {
                return Err(StepError::data(
                    "ROW_WIDTH_MISMATCH",
                    format!(
                        "stream '{}' produced a row with {} values, layout declares {}",
                        self.name,
                        row.len(),
                        self.layout.len()
                    ),
                )
                .with_details(serde_json::json!({
                    "stream": self.name,
                    "row": self.rows_read + 1,
                    "expected": self.layout.len(),
                    "actual": row.len(),
                })));
            }
            Some(_) => self.rows_read += 1,
            None => self.exhausted = true,
        }
        Ok(next)
    }
}

/// Result of a successful registration.
pub(crate) struct Registration {
    pub(crate) join_type: JoinType,
    pub(crate) streams: Vec<StreamState>,
    pub(crate) comparator: KeyComparator,
    pub(crate) merged: RowLayout,
}

/// Register the configured streams against the offered links.
///
/// Disabled links are skipped and the remaining streams are renumbered in
/// configuration order before key arity is checked.
pub(crate) fn register(
    settings: &MergeJoinSettings,
    links: Vec<InputLink>,
) -> Result<Registration, StepError> {
    let join_type: JoinType = settings.join_type.parse()?;

    if settings.keys.len() != settings.streams.len() {
        return Err(StepError::config(
            "KEY_LIST_COUNT_MISMATCH",
            format!(
                "{} streams configured but {} key lists",
                settings.streams.len(),
                settings.keys.len()
            ),
        ));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = settings.streams.iter().find(|s| !seen.insert(s.as_str())) {
        return Err(StepError::config(
            "DUPLICATE_STREAM",
            format!("stream '{dup}' is configured more than once"),
        ));
    }

    let mut by_name: HashMap<String, InputLink> = HashMap::with_capacity(links.len());
    for link in links {
        if by_name.contains_key(&link.name) {
            return Err(StepError::config(
                "DUPLICATE_LINK",
                format!("more than one upstream link is named '{}'", link.name),
            ));
        }
        by_name.insert(link.name.clone(), link);
    }

    let mut streams = Vec::with_capacity(settings.streams.len());
    for (name, keys) in settings.streams.iter().zip(&settings.keys) {
        let link = by_name.remove(name).ok_or_else(|| {
            StepError::config(
                "STREAM_NOT_FOUND",
                format!("no upstream link found for stream '{name}'"),
            )
        })?;
        if !link.enabled {
            tracing::warn!(stream = %name, "Upstream link is disabled, skipping stream");
            continue;
        }

        let key_fields = split_key_list(keys);
        if key_fields.is_empty() {
            return Err(StepError::config(
                "EMPTY_KEY",
                format!("stream '{name}' declares no key fields"),
            ));
        }
        let key_ordinals = key_fields
            .iter()
            .map(|field| {
                link.layout.index_of(field).ok_or_else(|| {
                    StepError::config(
                        "KEY_FIELD_NOT_FOUND",
                        format!("key field '{field}' not found in stream '{name}'"),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            stream = %name,
            index = streams.len(),
            fields = link.layout.len(),
            key = %key_fields.join(","),
            "Registered merge join input"
        );
        streams.push(StreamState {
            name: link.name,
            layout: link.layout,
            key_ordinals,
            input: link.input,
            exhausted: false,
            rows_read: 0,
        });
    }

    for unused in by_name.keys() {
        tracing::debug!(link = %unused, "Upstream link is not referenced by the join");
    }

    let Some(first) = streams.first() else {
        return Err(StepError::config(
            "NO_ACTIVE_STREAMS",
            "every configured stream is disabled",
        ));
    };

    let arity = first.key_ordinals.len();
    if let Some(bad) = streams.iter().find(|s| s.key_ordinals.len() != arity) {
        return Err(StepError::config(
            "KEY_ARITY_MISMATCH",
            format!(
                "stream '{}' has {} key fields, stream '{}' has {}",
                bad.name,
                bad.key_ordinals.len(),
                first.name,
                arity
            ),
        ));
    }

    let parts = (0..arity)
        .map(|part| -> Result<KeyPartComparator, StepError> {
            let kinds: Vec<_> = streams
                .iter()
                .filter_map(|s| s.layout.field(s.key_ordinals[part]).map(|f| f.kind))
                .collect();
            let lead = first
                .layout
                .field(first.key_ordinals[part])
                .ok_or_else(|| StepError::internal("KEY_ORDINAL", "resolved ordinal out of range"))?;
            Ok(KeyPartComparator::resolve(part, &kinds, lead))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut merged = RowLayout::default();
    for stream in &streams {
        merged.merge(&stream.layout);
    }

    Ok(Registration {
        join_type,
        streams,
        comparator: KeyComparator::new(parts),
        merged,
    })
}
