//! Configure a small application, freeze it and launch two instances.
//!
//! Run with `RUST_LOG=debug cargo run --example quickstart` to see the
//! tree mutations and materialization passes.

use std::error::Error;

use kiln::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Connection settings handed to the application as a wirelet.
#[derive(Debug)]
struct Endpoint(&'static str);

struct Database {
    url: String,
}

struct Repository {
    db: std::sync::Arc<Database>,
    table: &'static str,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut tree =
        ConfigTree::new(Modifiers::GUEST | Modifiers::APPLICATION | Modifiers::CONTAINER)?;
    let root = tree.root();
    tree.set_name(root, "shop")?;

    let db = tree.create_child(
        root,
        Some("db"),
        Modifiers::SOURCE,
        WireletList::new().with(Endpoint("postgres://localhost/shop")),
    )?;
    let endpoint = tree
        .wirelets_mut(db)?
        .consume::<Endpoint>()
        .map(|e| e.0)
        .unwrap_or("sqlite::memory:");
    let db_slot = tree.provide_instance(
        db,
        [],
        from_fn(move |_| {
            Ok(slot_value(Database {
                url: endpoint.to_string(),
            }))
        }),
    )?;

    let repo = tree.create_child(root, Some("orders"), Modifiers::SOURCE, WireletList::new())?;
    let repo_slot = tree.provide_instance(
        repo,
        [db_slot],
        from_fn(|ctx| {
            Ok(slot_value(Repository {
                db: ctx.dependency_as::<Database>(0)?,
                table: "orders",
            }))
        }),
    )?;
    tree.export(repo, "orders", repo_slot)?;

    let image = tree.into_image()?;
    for _ in 0..2 {
        let instance = image.launch(WireletList::new())?;
        instance.start()?;
        let orders = instance.service::<Repository>("orders")?;
        let guest = instance.guest().ok_or("root is guest-bearing")?;
        info!(
            guest = %guest.id(),
            table = orders.table,
            url = %orders.db.url,
            "instance running"
        );
        instance.stop()?;
    }
    Ok(())
}
