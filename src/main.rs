use log::info;

use simpledb::{Database, MemBTree, Result};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("SimpleDB - a B+Tree key-value database in Rust");
    println!("==============================================\n");

    let db_path = "demo.db";
    if let Err(e) = run(db_path) {
        eprintln!("demo failed: {}", e);
        std::fs::remove_file(db_path).ok();
        std::process::exit(1);
    }

    // Clean up
    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}

fn run(db_path: &str) -> Result<()> {
    // In-memory tree with small nodes so splits show up quickly
    let mut mem = MemBTree::new();
    for i in 0..20u32 {
        mem.set(format!("key{:02}", i).as_bytes(), b"v")?;
    }
    mem.check_invariants()?;
    println!("In-memory tree holds {} keys", mem.len());

    {
        let db = Database::open(db_path)?;
        let users = db.create_table("users")?;

        let rows: [(&[u8], &[u8]); 3] = [
            (b"alice", b"admin"),
            (b"bob", b"editor"),
            (b"carol", b"viewer"),
        ];
        for (key, value) in rows {
            users.insert(key, value)?;
            println!("Inserted {}", String::from_utf8_lossy(key));
        }
        users.update(b"bob", b"admin")?;

        println!("\nScan after \"alice\":");
        for entry in users.scan(b"alice")? {
            let (key, value) = entry?;
            println!(
                "  - {} = {}",
                String::from_utf8_lossy(&key),
                String::from_utf8_lossy(&value)
            );
        }
        db.close()?;
    }

    // Reopen and read back
    let db = Database::open(db_path)?;
    let users = db.table("users")?;
    info!("reopened with tables {:?}", db.table_names());
    println!("\nAfter reopen:");
    println!("  - Rows: {}", users.len());
    println!("  - Pages in file: {}", db.page_manager().num_pages());
    if let Some(role) = users.select(b"bob")? {
        println!("  - bob = {}", String::from_utf8_lossy(&role));
    }
    db.close()
}
