use sea_orm::Database;
use sea_orm_migration::prelude::*;

async fn run<M: MigratorTrait>(cmd: &str, db_url: &str) -> Result<(), DbErr> {
    let db = Database::connect(db_url).await?;
    match cmd {
        "up" => M::up(&db, None).await,
        "down" => M::down(&db, None).await,
        "fresh" => M::fresh(&db).await,
        "status" => M::status(&db).await,
        other => Err(DbErr::Custom(format!("unknown command: {other}"))),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut args = std::env::args().skip(1);
    let cmd = args.next().unwrap_or_else(|| "up".to_string());
    let target = args.next().unwrap_or_else(|| "records".to_string());

    if !matches!(cmd.as_str(), "up" | "down" | "fresh" | "status") {
        eprintln!("Usage: cargo run -p migration -- [up|down|fresh|status] [records|mirror]");
        std::process::exit(2);
    }

    match target.as_str() {
        "records" => {
            let db_url = std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./ledgerlens.db?mode=rwc".to_string());
            run::<migration::Migrator>(&cmd, &db_url).await?;
        }
        "mirror" => {
            let db_url = std::env::var("MIRROR_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./ledgerlens_mirror.db?mode=rwc".to_string());
            run::<migration::MirrorMigrator>(&cmd, &db_url).await?;
        }
        _ => {
            eprintln!("Usage: cargo run -p migration -- [up|down|fresh|status] [records|mirror]");
            std::process::exit(2);
        }
    }

    Ok(())
}
