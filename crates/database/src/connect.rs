use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .sqlx_logging(false); // Disable SQLx log

    Database::connect(opt).await
}
