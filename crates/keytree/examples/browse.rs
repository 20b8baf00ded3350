//! Walks a simulated key space through the connections model.
//!
//! A fake server answers child requests from a worker thread; the main
//! thread is the model's control thread and applies completions as it drains
//! its dispatcher.
//!
//! Run with: cargo run -p keytree --example browse [settings.json|settings.toml]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use keytree::Dispatcher;
use keytree::model::{
    ConnectionsModel, ItemEventSender, ItemModel, ItemRef, ItemRole, ItemType, LazyItem,
    LoadCompletion, MatchFlags, ModelConfig, ModelIndex, ModelTreeDebug,
};
use keytree::settings::Settings;
use tracing_subscriber::EnvFilter;

const KEYS: &[&str] = &[
    "users:1",
    "users:2",
    "users:active:1",
    "orders:2024:1",
    "orders:2024:2",
    "session",
];

/// Builds the children of the namespace `prefix` (empty for the database root).
fn children_of(prefix: &str, events: &ItemEventSender) -> Vec<ItemRef> {
    let mut namespaces = BTreeSet::new();
    let mut keys = Vec::new();

    for key in KEYS {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        match rest.split_once(':') {
            Some((segment, _)) => {
                namespaces.insert(format!("{prefix}{segment}"));
            }
            None => keys.push(*key),
        }
    }

    let mut children: Vec<ItemRef> = namespaces
        .into_iter()
        .map(|name| namespace(name, events.clone()))
        .collect();
    children.extend(keys.into_iter().map(|key| {
        LazyItem::builder(ItemType::Key, key, events.clone())
            .icon("key")
            .build() as ItemRef
    }));
    children
}

fn namespace(name: String, events: ItemEventSender) -> ItemRef {
    let display = name.rsplit(':').next().unwrap_or(&name).to_string();
    let prefix = format!("{name}:");
    let loader_events = events.clone();
    LazyItem::builder(ItemType::Namespace, name, events)
        .display_name(display)
        .icon("namespace")
        .loader(move |_item: ItemRef, completion: LoadCompletion| {
            completion.finish(children_of(&prefix, &loader_events));
        })
        .build()
}

fn database(name: &str, events: ItemEventSender) -> ItemRef {
    let loader_events = events.clone();
    LazyItem::builder(ItemType::Database, name, events)
        .icon("database")
        .loader(move |_item: ItemRef, completion: LoadCompletion| {
            let events = loader_events.clone();
            // Simulates a round trip to the server.
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                completion.finish(children_of("", &events));
            });
        })
        .on_event(|item, event| {
            if event == "reload" {
                item.reload();
            }
        })
        .build()
}

fn drain(dispatcher: &Dispatcher) -> Result<(), Box<dyn std::error::Error>> {
    while dispatcher.process_pending_timeout(Duration::from_millis(200))? > 0 {}
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keytree=debug")),
        )
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load_or_default(path)?,
        None => Settings::new(),
    };
    let config = ModelConfig::from_settings(&settings);

    let dispatcher = Dispatcher::for_current_thread();
    let model = ConnectionsModel::new(config);
    // Stand-in for a view: expanding a node loads it and records it.
    let view_model = Arc::downgrade(&model);
    model.expand().connect(move |index| {
        let Some(model) = view_model.upgrade() else {
            return;
        };
        println!("expand requested: {}", model.display_text(index).unwrap_or_default());
        model.fetch_more(index);
        model.set_expanded(index);
    });

    let events = model.item_events();
    let db_events = events.clone();
    let server = LazyItem::builder(ItemType::Server, "127.0.0.1:6379", events)
        .display_name("local")
        .icon("server")
        .loader(move |_item: ItemRef, completion: LoadCompletion| {
            completion.finish(vec![database("db0", db_events.clone())]);
        })
        .build();
    model.add_root_item(server);

    let root = ModelIndex::invalid();
    let server_index = model.index(0, 0, &root);
    model.fetch_more(&server_index);

    let db_index = model.index(0, 0, &server_index);
    model.fetch_more(&db_index);
    drain(&dispatcher)?;

    // Open every namespace under the database. Nested namespaces only show
    // up once their parent is loaded, so repeat until nothing new appears.
    let mut opened = 0;
    loop {
        let namespaces = model.match_items(
            &model.index(0, 0, &db_index),
            ItemRole::Type,
            &"namespace".into(),
            None,
            MatchFlags::fixed_recursive(),
        );
        if namespaces.len() == opened {
            break;
        }
        opened = namespaces.len();
        for index in &namespaces {
            model.fetch_more(index);
            model.set_expanded(index);
        }
    }

    println!("{}", ModelTreeDebug::new().display(&*model));

    println!("reloading db0, {} namespaces tracked", model.expansion().len());
    model.send_event(&db_index, "reload");
    drain(&dispatcher)?;

    println!("{}", ModelTreeDebug::new().display(&*model));
    Ok(())
}
