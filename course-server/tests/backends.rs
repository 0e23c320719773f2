use anyhow::Result;
use course_blob::BlobStore;
use course_core::{CourseConfig, CourseError, ErrorKind, PointerStore};
use course_queue::RegistryBackend;
use course_server::config::{apply_defaults, PipelineSettings};
use course_server::PipelineParts;

fn config_with(pairs: &[(&str, String)]) -> CourseConfig {
    let mut config = CourseConfig::new();
    for (key, value) in pairs {
        config.set(*key, value.clone());
    }
    apply_defaults(&mut config);
    config
}

#[tokio::test]
async fn defaults_run_entirely_in_memory() -> Result<()> {
    let parts = PipelineParts::from_config(&config_with(&[]).snapshot()).await?;

    assert_eq!(parts.blob_store.name(), "memory");
    assert_eq!(parts.pointers.name(), "memory");
    assert_eq!(parts.registry.name(), "memory");
    assert_eq!(parts.objects.names(), vec!["memory"]);
    Ok(())
}

#[tokio::test]
async fn file_registry_opens_under_the_configured_path() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("registry.json");
    let config = config_with(&[
        ("registry.backend", "file".to_string()),
        ("registry.path", path.display().to_string()),
    ]);

    let parts = PipelineParts::from_config(&config.snapshot()).await?;
    assert_eq!(parts.registry.name(), "file");
    assert_eq!(parts.registry.pending_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn unknown_backends_are_rejected() {
    let config = config_with(&[("pointer.backend", "mongo".to_string())]);

    let err = match PipelineParts::from_config(&config.snapshot()).await {
        Ok(_) => panic!("unknown pointer backend accepted"),
        Err(err) => err,
    };
    let course_err = CourseError::from_anyhow(&err).expect("course error");
    assert_eq!(course_err.kind, ErrorKind::Validation);
}

#[test]
fn write_policy_is_parsed_from_config() {
    let config = config_with(&[("pointer.write_policy", "strict".to_string())]);
    let settings = PipelineSettings::from_config(&config.snapshot()).expect("settings");
    assert_eq!(settings.write_policy.as_str(), "strict");

    let config = config_with(&[("pointer.write_policy", "sometimes".to_string())]);
    assert!(PipelineSettings::from_config(&config.snapshot()).is_err());
}
