use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ReelError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        ReelError::asset_load("x")
            .to_string()
            .contains("asset load error:")
    );
    assert!(
        ReelError::audio_setup("x")
            .to_string()
            .contains("audio setup error:")
    );
    assert!(
        ReelError::encoder_unsupported("x")
            .to_string()
            .contains("encoder unsupported:")
    );
    assert!(
        ReelError::EmptyAssetSet { requested: 3 }
            .to_string()
            .contains("none of the 3")
    );
}

#[test]
fn recoverable_errors_are_not_fatal() {
    assert!(!ReelError::asset_load("x").is_fatal());
    assert!(!ReelError::audio_setup("x").is_fatal());
    assert!(!ReelError::Cancelled.is_fatal());
    assert!(ReelError::Cancelled.is_cancelled());

    assert!(ReelError::encoder_unsupported("x").is_fatal());
    assert!(ReelError::EmptyAssetSet { requested: 1 }.is_fatal());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ReelError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
