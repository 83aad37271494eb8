use std::path::PathBuf;

use rusqlite::backup::Backup;

use crate::cli::open;
use crate::error::Result;
use crate::fmt::format_bytes;

pub fn run(workspace: Option<&str>, output: Option<String>) -> Result<()> {
    let (ws, _, store) = open(workspace)?;

    let dest_path = match output {
        Some(p) => PathBuf::from(p),
        None => {
            let backups_dir = ws.path.join("backups");
            std::fs::create_dir_all(&backups_dir)?;
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            backups_dir.join(format!("nominal-{stamp}.db"))
        }
    };

    let mut dest_conn = rusqlite::Connection::open(&dest_path)?;
    let backup = Backup::new(store.conn(), &mut dest_conn)?;
    backup.run_to_completion(100, std::time::Duration::from_millis(10), None)?;

    let size = std::fs::metadata(&dest_path)?.len();
    println!("Backup of {} saved to {}", ws.name, dest_path.display());
    println!("Size: {}", format_bytes(size));
    Ok(())
}
