// src/services/audit_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::AuditRepository,
    models::audit::{AuditLogEntry, AuditPage, AuditQuery, NewAuditEntry},
};

/// Trilha de auditoria. As mutações privilegiadas gravam a própria
/// entrada na transação do repositório; aqui ficam a leitura e o registro
/// de eventos sem mutação, que também não é best-effort: se falhar, a
/// operação falha.
#[derive(Clone)]
pub struct AuditService {
    repo: Arc<dyn AuditRepository>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AppError> {
        let action = entry.action.as_str();
        let tenant_id = entry.tenant_id;

        self.repo.append(entry).await.inspect_err(|e| {
            tracing::error!(%tenant_id, action, error = %e, "❌ Falha ao gravar auditoria");
        })
    }

    pub async fn list(&self, tenant_id: Uuid, query: &AuditQuery) -> Result<AuditPage, AppError> {
        let (page, per_page) = query.pagination();
        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| AppError::invalid("Página fora do intervalo permitido."))?;

        let (items, total) = self
            .repo
            .list(tenant_id, query.action.as_deref(), per_page, offset)
            .await?;

        Ok(AuditPage {
            items,
            total,
            page,
            per_page,
        })
    }
}
