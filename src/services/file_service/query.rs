use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::Category;
use sea_orm::sea_query::{Alias, Expr, Func, Query, SimpleExpr};
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use super::FileService;
use super::metadata::to_records;
use super::types::{
    CategoryStats, FileFilter, FilePage, FileStats, PageRequest, Pagination, StatsTotals,
};

#[derive(Debug, FromQueryResult)]
struct CategoryRow {
    category: String,
    count: i64,
    total_size: Option<i64>,
}

impl FileService {
    fn resolve_page(&self, request: PageRequest) -> Result<(u64, u64), AppError> {
        let page = request.page.unwrap_or(1);
        let page_size = request.page_size.unwrap_or(self.config.default_page_size);

        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if page_size < 1 || page_size > self.config.max_page_size {
            return Err(AppError::Validation(format!(
                "pageSize must be between 1 and {}",
                self.config.max_page_size
            )));
        }

        // The offset must fit a signed 64-bit bind parameter
        let in_range = (page - 1)
            .checked_mul(page_size)
            .is_some_and(|offset| offset <= i64::MAX as u64);
        if !in_range {
            return Err(AppError::Validation(format!(
                "page {} is out of range for pageSize {}",
                page, page_size
            )));
        }

        Ok((page, page_size))
    }

    /// Newest first, ties broken by id.
    pub async fn list(&self, filter: FileFilter, request: PageRequest) -> Result<FilePage, AppError> {
        let (page, page_size) = self.resolve_page(request)?;

        let mut query =
            UploadedFiles::find().filter(uploaded_files::Column::IsActive.eq(filter.is_active));

        if let Some(category) = filter.category {
            query = query.filter(uploaded_files::Column::Category.eq(category.as_str()));
        }
        if let Some(owner_id) = filter.owner_id {
            query = query.filter(uploaded_files::Column::OwnerId.eq(owner_id));
        }
        if let Some(entity_type) = filter.associated_entity_type {
            query = query.filter(uploaded_files::Column::AssociatedEntityType.eq(entity_type));
        }
        if let Some(entity_id) = filter.associated_entity_id {
            query = query.filter(uploaded_files::Column::AssociatedEntityId.eq(entity_id));
        }
        if !filter.tags.is_empty() {
            query = query.filter(
                uploaded_files::Column::Id.in_subquery(
                    Query::select()
                        .column(file_tags::Column::FileId)
                        .from(file_tags::Entity)
                        .and_where(file_tags::Column::Tag.is_in(filter.tags))
                        .to_owned(),
                ),
            );
        }

        let paginator = query
            .order_by_desc(uploaded_files::Column::CreatedAt)
            .order_by_desc(uploaded_files::Column::Id)
            .paginate(&self.db, page_size);

        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;
        let items = to_records(&self.db, models).await?;

        Ok(FilePage {
            items,
            pagination: Pagination {
                total,
                page,
                page_size,
                page_count: total.div_ceil(page_size),
            },
        })
    }

    /// Count and summed size of active files per category, largest count first.
    pub async fn stats_by_category(&self) -> Result<FileStats, AppError> {
        let rows = UploadedFiles::find()
            .select_only()
            .column(uploaded_files::Column::Category)
            .column_as(Expr::col(uploaded_files::Column::Id).count(), "count")
            .column_as(
                SimpleExpr::FunctionCall(Func::cast_as(
                    Func::sum(Expr::col(uploaded_files::Column::SizeBytes)),
                    Alias::new("BIGINT"),
                )),
                "total_size",
            )
            .filter(uploaded_files::Column::IsActive.eq(true))
            .group_by(uploaded_files::Column::Category)
            .into_model::<CategoryRow>()
            .all(&self.db)
            .await?;

        let mut categories = rows
            .into_iter()
            .map(|row| {
                let category = row
                    .category
                    .parse::<Category>()
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                Ok(CategoryStats {
                    category,
                    count: row.count.max(0) as u64,
                    total_size: row.total_size.unwrap_or(0),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        categories.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.category.as_str().cmp(b.category.as_str()))
        });

        let totals = StatsTotals {
            files: categories.iter().map(|c| c.count).sum(),
            size: categories.iter().map(|c| c.total_size).sum(),
        };

        Ok(FileStats { categories, totals })
    }
}
