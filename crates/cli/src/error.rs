// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.

use std::fmt;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct TandemError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
}

impl TandemError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Refusing to release a lock whose holder is still alive
    pub fn release_refused(batch_id: &str, holder: &str, expires_in_secs: i64) -> Self {
        TandemError::new(format!("Refusing to release lock '{}'", batch_id))
            .with_context(format!("Lock is held by live instance '{}'", holder))
            .with_context(format!("Lease expires in {} seconds", expires_in_secs))
            .with_suggestion("Wait for the holder to finish or for the lease to expire")
            .with_suggestion(format!(
                "Force release with: tandem release {} --force",
                batch_id
            ))
    }

    /// The lock was rewritten between the liveness check and the delete
    pub fn release_conflict(batch_id: &str) -> Self {
        TandemError::new(format!("Lock '{}' changed while releasing", batch_id))
            .with_context("Another instance refreshed or took over the lock")
            .with_suggestion(format!("Check the new holder with: tandem holder {}", batch_id))
    }

    /// The configured store only exists inside one process
    pub fn memory_store() -> Self {
        TandemError::new("The configured store is process-local")
            .with_context("A memory store cannot be inspected from another process")
            .with_suggestion("Configure a file store: [store] kind = \"file\"")
    }
}

impl fmt::Display for TandemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for TandemError {}
