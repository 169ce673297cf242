use crm_core::{Colour, CrmNumber, StimulusId, Talker};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("no stimulus for talker {talker}, call sign {callsign:?}, {colour} {number}")]
pub struct ResolveError {
    pub talker: Talker,
    pub callsign: String,
    pub colour: Colour,
    pub number: CrmNumber,
    #[source]
    pub source: Option<io::Error>,
}

/// Maps a spoken phrase to the asset that holds it.
pub trait StimulusResolver {
    fn resolve(
        &self,
        talker: Talker,
        callsign: &str,
        colour: Colour,
        number: CrmNumber,
    ) -> Result<StimulusId, ResolveError>;
}

impl<V: StimulusResolver + ?Sized> StimulusResolver for &V {
    fn resolve(
        &self,
        talker: Talker,
        callsign: &str,
        colour: Colour,
        number: CrmNumber,
    ) -> Result<StimulusId, ResolveError> {
        (**self).resolve(talker, callsign, colour, number)
    }
}

/// Finds recordings laid out as `<root>/crm/Talker<n>/..<callsign>_<colour>_<number word>.wav`.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn talker_dir(&self, talker: Talker) -> PathBuf {
        self.root.join("crm").join(format!("Talker{talker}"))
    }
}

impl StimulusResolver for DirectoryResolver {
    fn resolve(
        &self,
        talker: Talker,
        callsign: &str,
        colour: Colour,
        number: CrmNumber,
    ) -> Result<StimulusId, ResolveError> {
        let missing = |source| ResolveError {
            talker,
            callsign: callsign.to_string(),
            colour,
            number,
            source,
        };

        let dir = self.talker_dir(talker);
        let keyword = format!("{callsign}_{colour}_{}.wav", number.word());
        let listing = crm_cache::cached_listing(&dir).map_err(|e| missing(Some(e)))?;
        // Several takes of a phrase may share the keyword; the last in name order wins.
        listing
            .iter()
            .rev()
            .find(|name| name.contains(keyword.as_str()))
            .map(|name| StimulusId::new(dir.join(&**name).to_string_lossy()))
            .ok_or_else(|| missing(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn n(v: u8) -> CrmNumber {
        CrmNumber::new(v).unwrap()
    }

    #[test]
    fn finds_file_containing_phrase_keyword() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("crm").join("Talker3");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("03_baron_red_four.wav"), b"").unwrap();
        fs::write(dir.join("03_ringo_red_four.wav"), b"").unwrap();

        let resolver = DirectoryResolver::new(root.path());
        let id = resolver
            .resolve(Talker(3), "baron", Colour::Red, n(4))
            .unwrap();
        assert!(id.as_str().ends_with("03_baron_red_four.wav"));
    }

    #[test]
    fn later_take_of_the_same_phrase_wins() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("crm").join("Talker2");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a_baron_blue_two.wav"), b"").unwrap();
        fs::write(dir.join("b_baron_blue_two.wav"), b"").unwrap();

        let id = DirectoryResolver::new(root.path())
            .resolve(Talker(2), "baron", Colour::Blue, n(2))
            .unwrap();
        assert!(id.as_str().ends_with("b_baron_blue_two.wav"));
    }

    #[test]
    fn missing_phrase_names_the_request() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("crm").join("Talker1")).unwrap();

        let err = DirectoryResolver::new(root.path())
            .resolve(Talker(1), "eagle", Colour::Blue, n(2))
            .unwrap_err();
        assert_eq!(err.talker, Talker(1));
        assert_eq!(err.callsign, "eagle");
        assert!(err.source.is_none());
        assert!(err.to_string().contains("blue 2"));
    }

    #[test]
    fn missing_talker_directory_keeps_io_cause() {
        let root = tempfile::tempdir().unwrap();
        let err = DirectoryResolver::new(root.path())
            .resolve(Talker(9), "eagle", Colour::White, n(1))
            .unwrap_err();
        assert!(err.source.is_some());
    }
}
