use lazy_static::lazy_static;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, RwLock};
pub use string_cache::DefaultAtom as Atom;

lazy_static! {
    static ref LISTINGS: RwLock<HashMap<Atom, Arc<[Atom]>>> = RwLock::new(HashMap::new());
}

fn key(dir: &Path) -> Atom {
    Atom::from(dir.to_string_lossy().as_ref())
}

/// File names in `dir`, sorted. The directory is read once per process;
/// later calls return the cached listing.
pub fn cached_listing(dir: &Path) -> io::Result<Arc<[Atom]>> {
    let key = key(dir);
    if let Some(hit) = LISTINGS
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(&key)
    {
        return Ok(Arc::clone(hit));
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        names.push(Atom::from(entry.file_name().to_string_lossy().as_ref()));
    }
    names.sort_by(|a, b| (**a).cmp(&**b));
    let names: Arc<[Atom]> = names.into();

    let mut map = LISTINGS.write().unwrap_or_else(|e| e.into_inner());
    Ok(Arc::clone(map.entry(key).or_insert(names)))
}
