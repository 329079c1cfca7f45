//! In-memory request log

use std::collections::HashMap;

use tracing::{debug, warn};

use super::columns::{base_columns, Column, ColumnKind, CustomColumn};
use super::event::{PluginEvent, StateExport};
use crate::context::{RequestContext, ResponseContext, SerializedReply, SerializedRequest};
use crate::error::{InspectorError, Result};

/// Captured requests in arrival order, keyed by `iopa.Id`
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    contexts: Vec<RequestContext>,
    index: HashMap<String, usize>,
    selected_id: Option<String>,
    custom_columns: Vec<CustomColumn>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&RequestContext> {
        self.index.get(id).map(|&i| &self.contexts[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Requests in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &RequestContext> {
        self.contexts.iter()
    }

    /// Dispatch a message from the instrumented server
    ///
    /// Returns whether the log changed.
    pub fn handle(&mut self, event: PluginEvent) -> bool {
        match event {
            PluginEvent::Request(data) => self.on_request(data),
            PluginEvent::Response(request, reply) => self.on_response(request, reply),
        }
    }

    /// Record a new request; duplicates are ignored
    ///
    /// Some network stacks report the same request twice.
    pub fn on_request(&mut self, data: SerializedRequest) -> bool {
        match self.insert(data) {
            Ok(_) => true,
            Err(err) => {
                warn!("Ignoring request: {}", err);
                false
            }
        }
    }

    /// Record a new request, failing on duplicates
    pub fn insert(&mut self, data: SerializedRequest) -> Result<&RequestContext> {
        if data.id.is_empty() {
            return Err(InspectorError::InvalidContext {
                reason: "request has no iopa.Id".to_string(),
            });
        }
        if self.index.contains_key(&data.id) {
            return Err(InspectorError::DuplicateRequest { id: data.id });
        }

        let mut context = RequestContext::from_serialized(data);
        for column in &self.custom_columns {
            let value = column.resolve(&context);
            context.column_values.insert(column.key(), value);
        }

        let position = self.contexts.len();
        self.index.insert(context.id.clone(), position);
        self.contexts.push(context);
        Ok(&self.contexts[position])
    }

    /// Attach a response; responses for unknown requests are ignored
    ///
    /// The request may have been cleared from the log in the meantime.
    pub fn on_response(&mut self, request: SerializedRequest, reply: SerializedReply) -> bool {
        match self.apply_response(request, reply) {
            Ok(_) => true,
            Err(err) => {
                debug!("Ignoring response: {}", err);
                false
            }
        }
    }

    /// Attach a response, failing when the request is unknown
    pub fn apply_response(
        &mut self,
        request: SerializedRequest,
        reply: SerializedReply,
    ) -> Result<&RequestContext> {
        let position = *self
            .index
            .get(&request.id)
            .ok_or_else(|| InspectorError::RequestNotFound {
                id: request.id.clone(),
            })?;

        let duration = reply.timestamp - request.timestamp;
        let context = &mut self.contexts[position];
        context.merge_request(request);
        context.set_response(ResponseContext::from_serialized(reply), Some(duration));

        for column in self
            .custom_columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Response)
        {
            let value = column.resolve(context);
            context.column_values.insert(column.key(), value);
        }
        Ok(context)
    }

    /// Drop all requests
    pub fn clear(&mut self) {
        self.contexts.clear();
        self.index.clear();
    }

    pub fn select(&mut self, id: Option<String>) {
        self.selected_id = id;
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    /// The selected request, if it is still in the log
    pub fn selected(&self) -> Option<&RequestContext> {
        self.selected_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn custom_columns(&self) -> &[CustomColumn] {
        &self.custom_columns
    }

    /// Add a header column and fill it for every logged request
    ///
    /// Returns `false` when the same column already exists.
    pub fn add_custom_column(&mut self, column: CustomColumn) -> bool {
        if self.custom_columns.contains(&column) {
            return false;
        }
        let key = column.key();
        for context in &mut self.contexts {
            let value = column.resolve(context);
            context.column_values.insert(key.clone(), value);
        }
        self.custom_columns.push(column);
        true
    }

    /// Built-in columns followed by custom ones
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = base_columns();
        columns.extend(self.custom_columns.iter().map(Column::from));
        columns
    }

    /// Snapshot of the log
    pub fn export(&self) -> StateExport {
        StateExport {
            serialized_contexts: self.contexts.iter().map(RequestContext::to_serialized).collect(),
            selected_id: self.selected_id.clone(),
            custom_columns: self.custom_columns.clone(),
        }
    }

    /// Restore a snapshot on top of the current log
    ///
    /// Selection and custom columns are replaced; requests already in the log
    /// are kept and duplicates in the snapshot skipped. Returns the number of
    /// requests added.
    pub fn import(&mut self, state: StateExport) -> usize {
        self.selected_id = state.selected_id;
        self.custom_columns = state.custom_columns;

        let mut added = 0;
        for data in state.serialized_contexts {
            if self.on_request(data) {
                added += 1;
            }
        }

        for context in &mut self.contexts {
            for column in &self.custom_columns {
                let value = column.resolve(context);
                context.column_values.insert(column.key(), value);
            }
        }
        added
    }
}
