//! JSON file storage implementation.
//!
//! Stores one JSON file per routine, group and schedule under a root
//! directory (usually `.routine`), plus one JSON array of completions per
//! user. Routines and groups also get small meta markers (version +
//! updated_at).

use std::path::{Path, PathBuf};
use routine_core::{
    Completion, Group, GroupId, RepetitionSchedule, Routine, RoutineId, Time, UserId,
    WeekdaySchedule,
};
use super::{Storage, StorageError, Result};
use tokio::fs;
use tracing::debug;

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the subdirectories it needs.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("routines")).await?;
        fs::create_dir_all(root.join("groups")).await?;
        fs::create_dir_all(root.join("schedules").join("weekday")).await?;
        fs::create_dir_all(root.join("schedules").join("repetition")).await?;
        fs::create_dir_all(root.join("completions")).await?;

        fs::create_dir_all(root.join("meta").join("routines")).await?;
        fs::create_dir_all(root.join("meta").join("groups")).await?;

        Ok(Self { root })
    }

    fn routine_path(&self, id: RoutineId) -> PathBuf {
        self.root.join("routines").join(format!("{}.json", id))
    }
    fn group_path(&self, id: GroupId) -> PathBuf {
        self.root.join("groups").join(format!("{}.json", id))
    }
    fn weekday_path(&self, id: RoutineId) -> PathBuf {
        self.root.join("schedules").join("weekday").join(format!("{}.json", id))
    }
    fn repetition_path(&self, id: RoutineId) -> PathBuf {
        self.root.join("schedules").join("repetition").join(format!("{}.json", id))
    }
    fn completions_path(&self, user_id: UserId) -> PathBuf {
        self.root.join("completions").join(format!("{}.json", user_id))
    }

    fn meta_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join("meta").join(kind).join(format!("{}.meta.json", id))
    }

    /// Read and increment per-object version, return new version.
    async fn bump_version(&self, kind: &str, id: &str) -> Result<u64> {
        let path = self.meta_path(kind, id);
        let mut version = 0u64;
        if let Ok(s) = fs::read_to_string(&path).await {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&s) {
                if let Some(v) = json.get("version").and_then(|v| v.as_u64()) {
                    version = v;
                }
            }
        }
        version += 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    async fn load_completions(&self, user_id: UserId) -> Result<Vec<Completion>> {
        Ok(read_json(&self.completions_path(user_id)).await?.unwrap_or_default())
    }

    async fn store_completions(&self, user_id: UserId, completions: &[Completion]) -> Result<()> {
        write_json(&self.completions_path(user_id), &completions).await
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_routine(&mut self, routine: &Routine) -> Result<()> {
        write_json(&self.routine_path(routine.id), routine).await?;
        let version = self.bump_version("routines", &routine.id.to_string()).await?;
        debug!("Saved routine {} (v{})", routine.id, version);
        Ok(())
    }

    async fn load_routine(&self, id: RoutineId) -> Result<Option<Routine>> {
        read_json(&self.routine_path(id)).await
    }

    async fn get_routines_by_user(&self, user_id: UserId) -> Result<Vec<Routine>> {
        let all = list_dir(&self.root.join("routines")).await?;
        Ok(all.into_iter()
            .filter(|r: &Routine| r.owner_id == user_id)
            .collect())
    }

    async fn delete_routine(&mut self, id: RoutineId) -> Result<()> {
        let routine = self.load_routine(id).await?;

        remove_if_exists(&self.routine_path(id)).await?;
        remove_if_exists(&self.weekday_path(id)).await?;
        remove_if_exists(&self.repetition_path(id)).await?;
        remove_if_exists(&self.meta_path("routines", &id.to_string())).await?;

        if let Some(routine) = routine {
            let mut completions = self.load_completions(routine.owner_id).await?;
            let before = completions.len();
            completions.retain(|c| c.routine_id != id);
            if completions.len() != before {
                self.store_completions(routine.owner_id, &completions).await?;
            }
            debug!("Deleted routine {} and {} completions", id, before - completions.len());
        }
        Ok(())
    }

    async fn get_weekday_schedule(&self, routine_id: RoutineId) -> Result<Option<WeekdaySchedule>> {
        read_json(&self.weekday_path(routine_id)).await
    }

    async fn save_weekday_schedule(&mut self, schedule: &WeekdaySchedule) -> Result<()> {
        write_json(&self.weekday_path(schedule.routine_id), schedule).await
    }

    async fn get_repetition_schedule(
        &self,
        routine_id: RoutineId,
    ) -> Result<Option<RepetitionSchedule>> {
        read_json(&self.repetition_path(routine_id)).await
    }

    async fn save_repetition_schedule(&mut self, schedule: &RepetitionSchedule) -> Result<()> {
        write_json(&self.repetition_path(schedule.routine_id), schedule).await
    }

    async fn save_group(&mut self, group: &Group) -> Result<()> {
        write_json(&self.group_path(group.id), group).await?;
        self.bump_version("groups", &group.id.to_string()).await?;
        Ok(())
    }

    async fn list_groups(&self, user_id: UserId) -> Result<Vec<Group>> {
        let all = list_dir(&self.root.join("groups")).await?;
        Ok(all.into_iter()
            .filter(|g: &Group| g.owner_id == user_id)
            .collect())
    }

    async fn delete_group(&mut self, id: GroupId) -> Result<()> {
        remove_if_exists(&self.group_path(id)).await?;
        remove_if_exists(&self.meta_path("groups", &id.to_string())).await?;
        Ok(())
    }

    async fn get_completions(&self, user_id: UserId, from: Time, to: Time) -> Result<Vec<Completion>> {
        let mut completions: Vec<Completion> = self
            .load_completions(user_id)
            .await?
            .into_iter()
            .filter(|c| from <= c.completed_at && c.completed_at < to)
            .collect();
        completions.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));
        Ok(completions)
    }

    async fn save_completion(&mut self, completion: &Completion) -> Result<()> {
        let mut completions = self.load_completions(completion.user_id).await?;
        if !completions.contains(completion) {
            completions.push(completion.clone());
            self.store_completions(completion.user_id, &completions).await?;
        }
        Ok(())
    }

    async fn delete_completion(&mut self, completion: &Completion) -> Result<()> {
        let mut completions = self.load_completions(completion.user_id).await?;
        let Some(pos) = completions.iter().position(|c| c == completion) else {
            return Err(StorageError::NotFound(format!(
                "completion of routine {} at {}",
                completion.routine_id, completion.completed_at
            )));
        };
        completions.remove(pos);
        self.store_completions(completion.user_id, &completions).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json.as_bytes()).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    fs::remove_file(path).await.or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
    })?;
    Ok(())
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match read_json(&entry.path()).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping unreadable {}: {}", entry.path().display(), e),
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
    use routine_core::Priority;

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn routine_round_trip_and_owner_filter() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();

        let alice = UserId::new();
        let bob = UserId::new();
        let run = Routine::new(alice, "Run", Priority::High, nine());
        let read = Routine::new(bob, "Read", Priority::Low, nine());
        storage.save_routine(&run).await.unwrap();
        storage.save_routine(&read).await.unwrap();

        assert_eq!(storage.load_routine(run.id).await.unwrap(), Some(run.clone()));
        let alices = storage.get_routines_by_user(alice).await.unwrap();
        assert_eq!(alices, vec![run]);
        assert!(storage.load_routine(RoutineId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn schedules_are_replaced_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let id = RoutineId::new();

        assert!(storage.get_weekday_schedule(id).await.unwrap().is_none());
        storage
            .save_weekday_schedule(&WeekdaySchedule::from_days(id, &[Weekday::Mon]))
            .await
            .unwrap();
        storage
            .save_weekday_schedule(&WeekdaySchedule::from_days(id, &[Weekday::Tue]))
            .await
            .unwrap();
        let loaded = storage.get_weekday_schedule(id).await.unwrap().unwrap();
        assert_eq!(loaded.days(), vec![Weekday::Tue]);

        let anchor = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rep = RepetitionSchedule::new(id, 3, anchor).unwrap();
        storage.save_repetition_schedule(&rep).await.unwrap();
        assert_eq!(storage.get_repetition_schedule(id).await.unwrap(), Some(rep));
    }

    #[tokio::test]
    async fn completions_filter_by_interval_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let user = UserId::new();
        let routine = RoutineId::new();

        let jan1 = Completion::new(routine, user, Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap());
        let jan2 = Completion::new(routine, user, Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap());
        storage.save_completion(&jan2).await.unwrap();
        storage.save_completion(&jan1).await.unwrap();

        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(storage.get_completions(user, from, to).await.unwrap(), vec![jan1.clone()]);

        storage.delete_completion(&jan1).await.unwrap();
        assert!(matches!(
            storage.delete_completion(&jan1).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_routine_cascades_but_group_delete_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let user = UserId::new();

        let group = Group::new(user, "Morning");
        storage.save_group(&group).await.unwrap();
        let kept = Routine::new(user, "Meditate", Priority::Medium, nine()).with_group(group.id);
        let gone = Routine::new(user, "Journal", Priority::Low, nine());
        storage.save_routine(&kept).await.unwrap();
        storage.save_routine(&gone).await.unwrap();
        storage
            .save_weekday_schedule(&WeekdaySchedule::from_days(gone.id, &[Weekday::Fri]))
            .await
            .unwrap();

        let at = Utc.with_ymd_and_hms(2024, 1, 5, 8, 0, 0).unwrap();
        storage.save_completion(&Completion::new(gone.id, user, at)).await.unwrap();
        storage.save_completion(&Completion::new(kept.id, user, at)).await.unwrap();

        storage.delete_routine(gone.id).await.unwrap();
        assert!(storage.load_routine(gone.id).await.unwrap().is_none());
        assert!(storage.get_weekday_schedule(gone.id).await.unwrap().is_none());
        let remaining = storage
            .get_completions(user, at, at + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].routine_id, kept.id);

        storage.delete_group(group.id).await.unwrap();
        assert!(storage.list_groups(user).await.unwrap().is_empty());
        let still_there = storage.load_routine(kept.id).await.unwrap().unwrap();
        assert_eq!(still_there.group_id, Some(group.id));
    }
}
