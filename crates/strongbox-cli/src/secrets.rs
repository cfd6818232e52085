use color_eyre::Result;
use strongbox_core::{AsyncStore, Key, SecureStoreProvider};

use crate::{cli::Command, config::Config};

/// Execute a secret subcommand against the scoped store.
pub async fn handle<P: SecureStoreProvider>(
    command: Command,
    store: &AsyncStore<P>,
    config: &Config,
) -> Result<()> {
    match command {
        Command::Set {
            key,
            value,
            accessibility,
            synchronizable,
        } => {
            let accessibility = config.accessibility(accessibility, synchronizable)?;
            let key = Key::new(key)?;
            store.set_string(&key, &value, accessibility).await?;
            println!("Stored `{key}` in {}", store.service());
        }
        Command::Get { key } => {
            let key = Key::new(key)?;
            match store.string(&key).await? {
                Some(value) => println!("{value}"),
                None => println!("No secret stored under `{key}`."),
            }
        }
        Command::Remove { key } => {
            let key = Key::new(key)?;
            store.remove_item(&key).await?;
            println!("Removed `{key}`");
        }
        Command::Keys => {
            let keys = sorted_keys(store).await?;
            if keys.is_empty() {
                println!("No secrets yet. Add one with `strongbox set <key> <value>`.");
                return Ok(());
            }
            for key in keys {
                println!("{key}");
            }
        }
        Command::Clear => {
            store.remove_all_items().await?;
            println!("Cleared every secret in {}", store.service());
        }
        other => color_eyre::eyre::bail!("{other:?} is not a secret command"),
    }

    Ok(())
}

async fn sorted_keys<P: SecureStoreProvider>(store: &AsyncStore<P>) -> Result<Vec<String>> {
    let mut keys: Vec<String> = store
        .all_keys()
        .await?
        .into_iter()
        .map(String::from)
        .collect();
    keys.sort();
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use strongbox_core::Accessibility;

    use super::*;
    use crate::{cli::AccessibilityArg, storage};

    fn set(key: &str, value: &str) -> Command {
        Command::Set {
            key: key.into(),
            value: value.into(),
            accessibility: None,
            synchronizable: None,
        }
    }

    #[tokio::test]
    async fn set_get_remove_flow() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path());
        let config = Config::default();

        handle(set("b", "two"), &store, &config).await.expect("set b");
        handle(set("a", "one"), &store, &config).await.expect("set a");
        assert_eq!(
            sorted_keys(&store).await.expect("keys"),
            vec!["a".to_string(), "b".to_string()]
        );

        handle(Command::Remove { key: "a".into() }, &store, &config)
            .await
            .expect("remove");
        let a = Key::new("a").expect("key");
        assert_eq!(store.string(&a).await.expect("get"), None);

        handle(Command::Clear, &store, &config).await.expect("clear");
        assert!(sorted_keys(&store).await.expect("keys").is_empty());
    }

    #[tokio::test]
    async fn set_records_requested_policy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path());
        let command = Command::Set {
            key: "token".into(),
            value: "abc".into(),
            accessibility: Some(AccessibilityArg::AfterFirstUnlock),
            synchronizable: Some(true),
        };
        handle(command, &store, &Config::default())
            .await
            .expect("set");

        let token = Key::new("token").expect("key");
        assert_eq!(
            store.accessibility(&token).await.expect("accessibility"),
            Some(Accessibility::AfterFirstUnlock {
                synchronizable: true
            })
        );
    }

    #[tokio::test]
    async fn rejects_empty_keys_and_invalid_policies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path());
        let config = Config::default();

        assert!(handle(set("", "v"), &store, &config).await.is_err());
        let device_only_sync = Command::Set {
            key: "k".into(),
            value: "v".into(),
            accessibility: Some(AccessibilityArg::WhenUnlockedThisDeviceOnly),
            synchronizable: Some(true),
        };
        assert!(handle(device_only_sync, &store, &config).await.is_err());
        assert!(sorted_keys(&store).await.expect("keys").is_empty());
    }
}
