use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DbBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HttpRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HttpRecords::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    // === 请求/响应快照 ===
                    .col(
                        ColumnDef::new(HttpRecords::RequestHeaders)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(HttpRecords::RequestBody).blob().not_null())
                    .col(
                        ColumnDef::new(HttpRecords::ResponseHeaders)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HttpRecords::ResponseBody)
                            .blob()
                            .not_null(),
                    )
                    // === 事务元信息 ===
                    .col(ColumnDef::new(HttpRecords::Url).text().not_null())
                    .col(
                        ColumnDef::new(HttpRecords::Method)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HttpRecords::Host)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HttpRecords::CreateAt)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HttpRecords::HttpVersion)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HttpRecords::InnerTokenId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(HttpRecords::Status).integer().not_null())
                    // === 行时间戳 ===
                    .col(
                        ColumnDef::new(HttpRecords::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(HttpRecords::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 单列索引
        let single_column_indexes: [(&str, HttpRecords); 6] = [
            ("idx_http_records_url", HttpRecords::Url),
            ("idx_http_records_method", HttpRecords::Method),
            ("idx_http_records_host", HttpRecords::Host),
            ("idx_http_records_inner_token_id", HttpRecords::InnerTokenId),
            ("idx_http_records_status", HttpRecords::Status),
            ("idx_http_records_created_at", HttpRecords::CreatedAt),
        ];
        for (name, column) in single_column_indexes {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(HttpRecords::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        // 复合索引（查询路径：按令牌/主机/状态回溯最近事务）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_records_inner_token_created_at")
                    .table(HttpRecords::Table)
                    .col(HttpRecords::InnerTokenId)
                    .col((HttpRecords::CreatedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_records_host_method")
                    .table(HttpRecords::Table)
                    .col(HttpRecords::Host)
                    .col(HttpRecords::Method)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_records_status_created_at")
                    .table(HttpRecords::Table)
                    .col(HttpRecords::Status)
                    .col((HttpRecords::CreatedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_records_method_status")
                    .table(HttpRecords::Table)
                    .col(HttpRecords::Method)
                    .col(HttpRecords::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_records_host_status_created_at")
                    .table(HttpRecords::Table)
                    .col(HttpRecords::Host)
                    .col(HttpRecords::Status)
                    .col((HttpRecords::CreatedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        // JSON 头部的倒排索引只有 PostgreSQL 支持，其他后端跳过
        if manager.get_database_backend() == DbBackend::Postgres {
            let conn = manager.get_connection();
            conn.execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_http_records_request_headers_gin \
                 ON http_records USING gin(request_headers)",
            )
            .await?;
            conn.execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_http_records_response_headers_gin \
                 ON http_records USING gin(response_headers)",
            )
            .await?;
            conn.execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_http_records_url_pattern \
                 ON http_records USING gin(to_tsvector('english', url))",
            )
            .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HttpRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden, Clone, Copy)]
enum HttpRecords {
    Table,
    Id,
    RequestHeaders,
    RequestBody,
    ResponseHeaders,
    ResponseBody,
    Url,
    Method,
    Host,
    CreateAt,
    HttpVersion,
    InnerTokenId,
    Status,
    CreatedAt,
    UpdatedAt,
}
