use anyhow::Result;
use pretty_assertions::assert_eq;
use reloc::cli::{OrganizeArgs, RollbackArgs};
use reloc::config::Config;
use reloc::{
    ConflictStrategy, ExecuteOptions, Executor, OperationStatus, Plan, RelocError,
    TransactionManager, TransactionStatus,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

struct Layout {
    _dir: tempfile::TempDir,
    src: PathBuf,
    dest: PathBuf,
    log: PathBuf,
}

fn layout() -> Result<Layout> {
    let dir = tempdir()?;
    let src = dir.path().join("src");
    let dest = dir.path().join("dest");
    let log = dir.path().join("log");
    fs::create_dir_all(&src)?;
    fs::create_dir_all(&dest)?;
    Ok(Layout {
        src,
        dest,
        log,
        _dir: dir,
    })
}

fn movie_plan(l: &Layout) -> Result<(PathBuf, PathBuf, Plan)> {
    let source = l.src.join("Movie.2020.mkv");
    fs::write(&source, "new movie")?;
    let destination = l.dest.join("Movie (2020)/Movie (2020).mkv");
    let plan = Plan::new(&source, &destination);
    Ok((source, destination, plan))
}

fn occupy(path: &Path, content: &str) -> Result<()> {
    fs::create_dir_all(path.parent().unwrap())?;
    fs::write(path, content)?;
    Ok(())
}

#[test]
fn test_non_conflicting_move() -> Result<()> {
    let l = layout()?;
    let (source, destination, plan) = movie_plan(&l)?;

    let ops = Executor::new(ExecuteOptions::default()).execute(&[plan], ConflictStrategy::Skip)?;

    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].status, OperationStatus::Completed);
    assert_eq!(ops[0].destination, destination);
    assert!(!source.exists());
    assert_eq!(fs::read_to_string(&destination)?, "new movie");
    Ok(())
}

#[test]
fn test_conflict_with_skip_leaves_both_files() -> Result<()> {
    let l = layout()?;
    let source = l.src.join("Movie.2020.mkv");
    fs::write(&source, "new movie")?;
    let destination = l.dest.join("Movie (2020)/Movie (2020).mkv");
    occupy(&destination, "old movie")?;
    let plan = Plan::new(&source, &destination);
    assert!(plan.conflict);

    let mut exec = Executor::new(ExecuteOptions::default());
    let ops = exec.execute(&[plan], ConflictStrategy::Skip)?;

    assert!(ops.is_empty());
    assert_eq!(exec.skipped().len(), 1);
    assert_eq!(fs::read_to_string(&source)?, "new movie");
    assert_eq!(fs::read_to_string(&destination)?, "old movie");
    Ok(())
}

#[test]
fn test_conflict_with_rename() -> Result<()> {
    let l = layout()?;
    let source = l.src.join("Movie.2020.mkv");
    fs::write(&source, "new movie")?;
    let destination = l.dest.join("Movie (2020)/Movie (2020).mkv");
    occupy(&destination, "old movie")?;
    let plan = Plan::new(&source, &destination);

    let ops = Executor::new(ExecuteOptions::default()).execute(&[plan], ConflictStrategy::Rename)?;

    let renamed = l.dest.join("Movie (2020)/Movie (2020)-1.mkv");
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].status, OperationStatus::Completed);
    assert_eq!(ops[0].destination, renamed);
    assert_eq!(fs::read_to_string(&destination)?, "old movie");
    assert_eq!(fs::read_to_string(&renamed)?, "new movie");
    assert!(!source.exists());
    Ok(())
}

#[test]
fn test_rename_never_hits_existing_files() -> Result<()> {
    let l = layout()?;
    let destination = l.dest.join("clip.mp4");
    occupy(&destination, "0")?;
    for n in 1..=4 {
        occupy(&l.dest.join(format!("clip-{n}.mp4")), "taken")?;
    }
    let existing: Vec<PathBuf> = fs::read_dir(&l.dest)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;

    let source = l.src.join("clip.mp4");
    fs::write(&source, "fresh")?;
    let ops = Executor::new(ExecuteOptions::default())
        .execute(&[Plan::new(&source, &destination)], ConflictStrategy::Rename)?;

    assert_eq!(ops[0].destination, l.dest.join("clip-5.mp4"));
    assert!(!existing.contains(&ops[0].destination));
    for path in &existing {
        assert_ne!(fs::read_to_string(path)?, "fresh");
    }
    Ok(())
}

#[test]
fn test_journaled_partial_failure_and_rollback() -> Result<()> {
    let l = layout()?;
    let mut plans = Vec::new();
    let mut sources = Vec::new();
    for name in ["One.2001.mkv", "Two.2002.mkv", "Three.2003.mkv"] {
        let source = l.src.join(name);
        fs::write(&source, name)?;
        plans.push(Plan::new(&source, l.dest.join(name)));
        sources.push(source);
    }
    // Second source disappears between planning and execution.
    fs::remove_file(&sources[1])?;

    let mut manager = TransactionManager::new(&l.log)?;
    let (id, ops) = Executor::new(ExecuteOptions::default()).execute_with_transaction(
        &mut manager,
        &plans,
        ConflictStrategy::Skip,
    )?;

    let statuses: Vec<_> = ops.iter().map(|op| op.status).collect();
    assert_eq!(
        statuses,
        vec![
            OperationStatus::Completed,
            OperationStatus::Failed,
            OperationStatus::Completed
        ]
    );
    assert!(ops[1].error.is_some());

    let stored = manager.load(&id)?;
    assert_eq!(stored.status, TransactionStatus::Completed);
    assert!(stored.completed.is_some());
    assert_eq!(stored.operations, ops);
    assert_eq!(manager.list()?, vec![id.clone()]);

    let report = manager.rollback(&id)?;
    assert_eq!(report.restored.len(), 2);
    assert_eq!(fs::read_to_string(&sources[0])?, "One.2001.mkv");
    assert_eq!(fs::read_to_string(&sources[2])?, "Three.2003.mkv");
    assert!(!sources[1].exists());
    assert!(!l.dest.join("One.2001.mkv").exists());
    assert!(!l.dest.join("Three.2003.mkv").exists());
    assert_eq!(manager.load(&id)?.status, TransactionStatus::RolledBack);
    Ok(())
}

#[test]
fn test_second_rollback_is_rejected_without_changes() -> Result<()> {
    let l = layout()?;
    let (source, destination, plan) = movie_plan(&l)?;
    let mut manager = TransactionManager::new(&l.log)?;
    let (id, _) = Executor::new(ExecuteOptions::default()).execute_with_transaction(
        &mut manager,
        &[plan],
        ConflictStrategy::Skip,
    )?;
    manager.rollback(&id)?;

    // Put the file back at its destination by hand; a second rollback must not move it.
    fs::rename(&source, &destination)?;
    let err = manager.rollback(&id).unwrap_err();
    assert!(matches!(err, RelocError::AlreadyRolledBack(_)));
    assert!(err.to_string().contains("already rolled back"));
    assert!(destination.exists());
    assert!(!source.exists());
    Ok(())
}

#[test]
fn test_round_trip_restores_identical_content() -> Result<()> {
    let l = layout()?;
    let names = ["Alpha.1990.mkv", "Beta.1995.mp4", "Band - Song.flac"];
    for (i, name) in names.iter().enumerate() {
        fs::write(l.src.join(name), vec![i as u8; 1024 * (i + 1)])?;
    }
    let before: Vec<Vec<u8>> = names
        .iter()
        .map(|n| fs::read(l.src.join(n)))
        .collect::<std::io::Result<_>>()?;

    let files = reloc::scan::scan_files(&l.src)?;
    let planner = reloc::planner::Planner::new(
        &reloc::media::ExtensionDetector,
        &reloc::media::FilenameParser,
        &reloc::media::DefaultNaming,
    );
    let plans = planner.plan_organization(&files, &l.dest, None)?;
    assert_eq!(plans.len(), 3);

    let mut manager = TransactionManager::new(&l.log)?;
    let (id, ops) = Executor::new(ExecuteOptions::default()).execute_with_transaction(
        &mut manager,
        &plans,
        ConflictStrategy::Skip,
    )?;
    assert!(ops.iter().all(|op| op.status == OperationStatus::Completed));
    assert!(names.iter().all(|n| !l.src.join(n).exists()));

    manager.rollback(&id)?;
    for (name, content) in names.iter().zip(before) {
        assert_eq!(fs::read(l.src.join(name))?, content);
    }
    for op in &ops {
        assert!(!op.destination.exists());
    }
    Ok(())
}

#[test]
fn test_dry_run_touches_nothing() -> Result<()> {
    let l = layout()?;
    let (source, destination, plan) = movie_plan(&l)?;

    let ops = Executor::new(ExecuteOptions {
        dry_run: true,
        ..Default::default()
    })
    .execute(&[plan], ConflictStrategy::Skip)?;

    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].status, OperationStatus::Completed);
    assert!(source.exists());
    assert!(!destination.exists());
    assert!(!destination.parent().unwrap().exists());
    assert!(!l.log.exists());
    Ok(())
}

#[test]
fn test_engine_organize_then_rollback() -> Result<()> {
    let l = layout()?;
    fs::write(l.src.join("Movie.2020.mkv"), "m")?;
    fs::write(l.src.join("Show.S02E03.mkv"), "e")?;
    let config = Config {
        log_dir: l.log.clone(),
        ..Default::default()
    };

    let code = reloc::engine::organize(
        OrganizeArgs {
            dir: l.src.clone(),
            dest: Some(l.dest.clone()),
            ..Default::default()
        },
        &config,
    )?;
    assert_eq!(code, 0);
    assert!(l.dest.join("Movie (2020)/Movie (2020).mkv").exists());
    assert!(l.dest.join("Show/Season 02/Show - S02E03.mkv").exists());

    let manager = TransactionManager::new(&l.log)?;
    let ids = manager.list()?;
    assert_eq!(ids.len(), 1);

    let code = reloc::engine::rollback(
        RollbackArgs {
            id: Some(ids[0].clone()),
            ..Default::default()
        },
        &config,
    )?;
    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(l.src.join("Movie.2020.mkv"))?, "m");
    assert_eq!(fs::read_to_string(l.src.join("Show.S02E03.mkv"))?, "e");

    let code = reloc::engine::rollback(
        RollbackArgs {
            id: Some(ids[0].clone()),
            ..Default::default()
        },
        &config,
    );
    assert!(code.is_err());
    Ok(())
}

#[test]
fn test_engine_no_transaction_writes_no_journal() -> Result<()> {
    let l = layout()?;
    fs::write(l.src.join("Movie.2020.mkv"), "m")?;
    let config = Config {
        log_dir: l.log.clone(),
        ..Default::default()
    };

    let code = reloc::engine::organize(
        OrganizeArgs {
            dir: l.src.clone(),
            dest: Some(l.dest.clone()),
            no_transaction: true,
            ..Default::default()
        },
        &config,
    )?;
    assert_eq!(code, 0);
    assert!(l.dest.join("Movie (2020)/Movie (2020).mkv").exists());
    assert!(!l.log.exists());
    Ok(())
}
