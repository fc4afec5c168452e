//! Fulfills audiobook manifests and stores them with the book.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::{database_failure, format_handle, require_content_type, require_target};
use crate::account::AccountCredentials;
use crate::book::FormatKind;
use crate::borrow::context::BorrowContext;
use crate::borrow::subtask::{Subtask, SubtaskError, SubtaskFactory};
use crate::manifest::{
    AudioBookCredentials, FallbackLoader, ManifestFulfilled, ManifestRequest, manifest_cache_path,
};
use crate::task::{ErrorCode, TaskResult};

/// Creates [`AudioBookSubtask`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioBookSubtaskFactory;

impl SubtaskFactory for AudioBookSubtaskFactory {
    fn name(&self) -> &'static str {
        "audio-book"
    }

    fn create_subtask(&self) -> Box<dyn Subtask> {
        Box::new(AudioBookSubtask)
    }
}

/// Runs manifest fulfillment and stores the manifest in the audiobook format.
///
/// The fulfillment steps are merged into the borrow's own step log. Offline,
/// the manifest already stored with the book, or else the cached copy, is
/// used instead.
#[derive(Debug)]
pub struct AudioBookSubtask;

#[async_trait]
impl Subtask for AudioBookSubtask {
    #[instrument(skip_all, fields(book_id = %ctx.book_id()))]
    async fn execute(&mut self, ctx: &mut BorrowContext<'_>) -> Result<(), SubtaskError> {
        ctx.recorder().begin_new_step("Preparing manifest request");
        let target = require_target(ctx)?;
        let content_type = require_content_type(ctx)?;
        let handle = format_handle(ctx, FormatKind::AudioBook)?;
        let services = ctx.services();

        let stored = match handle.stored_manifest().await {
            Ok(stored) => stored,
            Err(error) => {
                warn!(error = %error, "stored manifest unreadable; ignoring it");
                None
            }
        };
        let offline = match stored {
            Some(data) => Some(data),
            None => match &services.config.manifest_cache_directory {
                Some(directory) => tokio::fs::read(manifest_cache_path(directory, &target))
                    .await
                    .ok(),
                None => None,
            },
        };
        let fallback = offline.map(|data| {
            let fulfilled = ManifestFulfilled {
                content_type: content_type.clone(),
                data,
            };
            Arc::new(move || Some(fulfilled.clone())) as FallbackLoader
        });

        let request = ManifestRequest::new(
            target.clone(),
            content_type,
            services.config.effective_user_agent(),
        )
        .with_credentials(credentials(ctx))
        .with_network_probe(Arc::clone(&services.network_probe))
        .with_fallback(fallback)
        .with_cache_directory(services.config.manifest_cache_directory.clone());

        ctx.recorder().current_step_succeeded(if request.fallback.is_some() {
            "Offline copy available"
        } else {
            "No offline copy"
        });

        let result = services.manifest.execute(&request).await;
        ctx.recorder().add_all(result.steps());
        let failure = result.last_failed_step().map(|step| {
            (
                step.message().to_string(),
                step.error_code().unwrap_or(ErrorCode::Unexpected),
            )
        });
        let data = match result {
            TaskResult::Success { value, .. } => value,
            TaskResult::Failure { .. } => {
                let (message, code) = failure.unwrap_or_else(|| {
                    ("Manifest fulfillment failed".to_string(), ErrorCode::Unexpected)
                });
                return Err(SubtaskError::failed(message, code));
            }
        };
        ctx.check_cancelled()?;

        ctx.recorder().begin_new_step("Storing manifest");
        handle
            .copy_in_manifest_and_uri(&data.fulfilled.data, &target)
            .await
            .map_err(|e| database_failure("Could not store the manifest", e))?;
        debug!(
            segments = data.manifest.reading_order.len(),
            "audiobook manifest stored"
        );
        ctx.recorder()
            .current_step_succeeded(format!("Stored manifest for {}", data.manifest.title));
        Ok(())
    }
}

fn credentials(ctx: &BorrowContext<'_>) -> Option<AudioBookCredentials> {
    if let Some(token) = ctx.active_bearer_token() {
        return Some(AudioBookCredentials::BearerToken {
            token: token.to_string(),
        });
    }
    ctx.account()
        .credentials
        .as_ref()
        .map(|credentials| match credentials {
            AccountCredentials::Basic { username, password }
            | AccountCredentials::BasicToken {
                username, password, ..
            } => match password {
                Some(password) => AudioBookCredentials::UsernamePassword {
                    username: username.clone(),
                    password: password.clone(),
                },
                None => AudioBookCredentials::UsernameOnly {
                    username: username.clone(),
                },
            },
            AccountCredentials::Token { token } => AudioBookCredentials::BearerToken {
                token: token.clone(),
            },
        })
}
