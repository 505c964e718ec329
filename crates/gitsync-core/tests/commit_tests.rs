//! Staging and committing local changes

mod common;

use common::{Harness, SITE, WORKSPACE};
use gitsync_content::{Block, PartialMetadata, StructuredDocument, content_hash};
use gitsync_core::{
    ChangeKind, CommitOutcome, ContentBody, ContentPiece, Error, Rank, SyncStore, WriteBatch,
};
use gitsync_git::FileAddition;
use pretty_assertions::assert_eq;

fn paragraph(text: &str) -> StructuredDocument {
    StructuredDocument::new(vec![Block::Paragraph { text: text.into() }])
}

/// Create a piece in the root group the way an editor would
async fn create_local_piece(harness: &Harness, title: &str, text: &str) -> ContentPiece {
    let snapshot = harness.snapshot().await;
    let root = snapshot.directories[""].content_group_id.clone();
    let last = snapshot.pieces_in_group(&root).last().map(|p| p.order.clone());
    let order = last.map_or_else(Rank::min, |rank| rank.gen_next());

    let piece = ContentPiece::new(root, order, title);
    let mut batch = WriteBatch::new();
    batch.pieces.upsert(piece.clone());
    batch
        .bodies
        .upsert(ContentBody::new(piece.id.clone(), None, paragraph(text)));
    harness.store.write(WORKSPACE, batch).await.unwrap();
    piece
}

#[tokio::test]
async fn nothing_to_push() {
    let harness = Harness::synced(SITE).await;
    assert!(harness.engine.status().await.unwrap().is_empty());
    assert_eq!(harness.engine.push("noop").await.unwrap(), None);
    assert_eq!(harness.provider.commits().len(), 1);
}

#[tokio::test]
async fn update_content_marks_record_modified() {
    let harness = Harness::synced(SITE).await;
    let a = harness.piece("A").await;

    let record = harness
        .engine
        .update_content(&a.id, None, paragraph("Hello, world"), None)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(record.current_hash, record.synced_hash);

    let status = harness.engine.status().await.unwrap();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].path, "a.md");
    assert_eq!(status[0].kind, ChangeKind::Modified);
}

#[tokio::test]
async fn push_commits_and_advances_high_water_mark() {
    let harness = Harness::synced(SITE).await;
    let a = harness.piece("A").await;
    let record = harness
        .engine
        .update_content(&a.id, None, paragraph("Hello, world"), None)
        .await
        .unwrap()
        .unwrap();

    let outcome = harness.engine.push("Edit A").await.unwrap();
    let Some(CommitOutcome::Success(commit)) = outcome else {
        panic!("expected a successful commit, got {outcome:?}");
    };
    assert_eq!(harness.provider.last_message().as_deref(), Some("Edit A"));

    let remote = harness.provider.file("docs/a.md").unwrap();
    assert_eq!(remote, "---\ntitle: A\n---\n\nHello, world\n");
    assert_eq!(content_hash(&remote), record.current_hash);

    let snapshot = harness.snapshot().await;
    let synced = &snapshot.records["a.md"];
    assert_eq!(synced.synced_hash, record.current_hash);
    assert!(!synced.has_local_changes());
    assert_eq!(snapshot.config.unwrap().last_commit_id, Some(commit.id));
    assert!(harness.engine.status().await.unwrap().is_empty());
}

#[tokio::test]
async fn own_commit_is_not_pulled_back() {
    let harness = Harness::synced(SITE).await;
    let a = harness.piece("A").await;
    harness
        .engine
        .update_content(&a.id, None, paragraph("Mine"), None)
        .await
        .unwrap();
    harness.engine.push("Edit A").await.unwrap();

    let pulled = harness.engine.pull().await.unwrap();
    assert!(pulled.is_empty());
}

#[tokio::test]
async fn stale_commit_changes_nothing() {
    let harness = Harness::synced(SITE).await;
    let a = harness.piece("A").await;
    harness
        .engine
        .update_content(&a.id, None, paragraph("Local"), None)
        .await
        .unwrap();
    harness
        .provider
        .push_commit(&[("docs/b.md", Some("# B\n\nRemote\n"))]);
    let before = harness.snapshot().await;

    let outcome = harness.engine.push("Edit A").await.unwrap();
    assert_eq!(outcome, Some(CommitOutcome::Stale));

    let after = harness.snapshot().await;
    assert_eq!(after.records, before.records);
    assert_eq!(after.config, before.config);
    assert_eq!(
        harness.provider.file("docs/a.md").as_deref(),
        Some("# A\n\nHello\n")
    );
}

#[tokio::test]
async fn pull_then_push_after_stale() {
    let harness = Harness::synced(SITE).await;
    let a = harness.piece("A").await;
    harness
        .engine
        .update_content(&a.id, None, paragraph("Local"), None)
        .await
        .unwrap();
    harness
        .provider
        .push_commit(&[("docs/b.md", Some("# B\n\nRemote\n"))]);

    assert_eq!(
        harness.engine.push("first try").await.unwrap(),
        Some(CommitOutcome::Stale)
    );
    let report = harness.sync_down().await;
    assert!(report.conflicts.is_empty());

    let outcome = harness.engine.push("second try").await.unwrap();
    assert!(matches!(outcome, Some(CommitOutcome::Success(_))));
    assert_eq!(
        harness.provider.file("docs/a.md").as_deref(),
        Some("---\ntitle: A\n---\n\nLocal\n")
    );
}

#[tokio::test]
async fn resolved_conflict_pushes_local_version() {
    let harness = Harness::synced(SITE).await;
    let a = harness.piece("A").await;
    harness
        .engine
        .update_content(&a.id, None, paragraph("Local"), None)
        .await
        .unwrap();
    harness
        .provider
        .push_commit(&[("docs/a.md", Some("# A\n\nRemote\n"))]);
    let report = harness.sync_down().await;
    let conflict = report.conflicts.into_iter().next().unwrap();

    let record = harness.engine.resolve_conflict(&conflict).await.unwrap();
    assert_eq!(record.synced_hash, conflict.pulled_hash);

    let outcome = harness.engine.push("Keep local").await.unwrap();
    assert!(matches!(outcome, Some(CommitOutcome::Success(_))));
    assert_eq!(
        harness.provider.file("docs/a.md").as_deref(),
        Some("---\ntitle: A\n---\n\nLocal\n")
    );
}

#[tokio::test]
async fn new_piece_is_added_on_push() {
    let harness = Harness::synced(SITE).await;
    let piece = create_local_piece(&harness, "New Page", "Fresh").await;

    let record = harness.engine.track_new_piece(&piece.id).await.unwrap();
    assert_eq!(record.path, "new-page.md");
    assert_eq!(record.synced_hash, "");
    assert_eq!(
        harness.engine.status().await.unwrap()[0].kind,
        ChangeKind::Added
    );

    let again = harness.engine.track_new_piece(&piece.id).await.unwrap();
    assert_eq!(again, record);

    harness.engine.push("Add page").await.unwrap();
    assert_eq!(
        harness.provider.file("docs/new-page.md").as_deref(),
        Some("---\ntitle: New Page\n---\n\nFresh\n")
    );
    assert_eq!(
        harness.snapshot().await.pieces[&piece.id].filename.as_deref(),
        Some("new-page.md")
    );
}

#[tokio::test]
async fn tracking_requires_a_mapped_group() {
    let harness = Harness::synced(SITE).await;
    let piece = ContentPiece::new("unmapped", Rank::min(), "Loose");
    let mut batch = WriteBatch::new();
    batch.pieces.upsert(piece.clone());
    harness.store.write(WORKSPACE, batch).await.unwrap();

    assert!(matches!(
        harness.engine.track_new_piece(&piece.id).await,
        Err(Error::NotFound { .. })
    ));
}

#[tokio::test]
async fn deleted_piece_is_removed_on_push() {
    let harness = Harness::synced(SITE).await;
    let b = harness.piece("B").await;

    assert_eq!(harness.engine.mark_deleted(&b.id).await.unwrap(), 1);
    let status = harness.engine.status().await.unwrap();
    assert_eq!(status[0].kind, ChangeKind::Deleted);

    let staged = harness.engine.stage().await.unwrap();
    assert_eq!(staged.deletions.len(), 1);
    assert_eq!(staged.deletions[0].path, "docs/b.md");

    harness.engine.push("Remove B").await.unwrap();
    assert_eq!(harness.provider.file("docs/b.md"), None);
    assert!(!harness.snapshot().await.records.contains_key("b.md"));
}

#[tokio::test]
async fn deleting_an_uncommitted_piece_needs_no_commit() {
    let harness = Harness::synced(SITE).await;
    let piece = create_local_piece(&harness, "Draft", "wip").await;
    harness.engine.track_new_piece(&piece.id).await.unwrap();
    harness.engine.mark_deleted(&piece.id).await.unwrap();

    assert_eq!(harness.engine.push("nothing").await.unwrap(), None);
    assert_eq!(harness.provider.commits().len(), 1);
    assert!(!harness.snapshot().await.records.contains_key("draft.md"));
}

#[tokio::test]
async fn variant_edit_is_written_to_variant_file() {
    let harness = Harness::synced(SITE).await;
    let snapshot = harness.snapshot().await;
    let intro = harness.piece("Intro").await;
    let fr = snapshot.variant_by_key("fr").unwrap().id.clone();

    let record = harness
        .engine
        .update_content(
            &intro.id,
            Some(&fr),
            paragraph("Salut"),
            Some(PartialMetadata {
                title: Some("Introduction".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.path, "_variants/fr/intro.md");

    harness.engine.push("Translate").await.unwrap();
    assert_eq!(
        harness.provider.file("docs/_variants/fr/intro.md").as_deref(),
        Some("---\ntitle: Introduction\n---\n\nSalut\n")
    );
    assert_eq!(
        harness
            .provider
            .file("docs/_variants/_base/intro.md")
            .as_deref(),
        Some("# Intro\n\nWelcome\n")
    );
}

#[tokio::test]
async fn metadata_edit_changes_hash() {
    let harness = Harness::synced(SITE).await;
    let b = harness.piece("B").await;
    let body = harness.snapshot().await.body(&b.id, None).unwrap().content.clone();

    let record = harness
        .engine
        .update_content(
            &b.id,
            None,
            body,
            Some(PartialMetadata {
                description: Some("The letter B".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap()
        .unwrap();
    assert!(record.has_local_changes());
    assert_eq!(
        harness.piece("B").await.description.as_deref(),
        Some("The letter B")
    );
}

#[tokio::test]
async fn update_of_unknown_piece_is_not_found() {
    let harness = Harness::synced(SITE).await;
    assert!(matches!(
        harness
            .engine
            .update_content("missing", None, paragraph("x"), None)
            .await,
        Err(Error::NotFound { .. })
    ));
}

#[tokio::test]
async fn commit_requires_initial_sync() {
    let harness = Harness::configured(SITE).await;
    assert!(matches!(
        harness.engine.commit("msg", Vec::new(), Vec::new()).await,
        Err(Error::NotSynced { .. })
    ));
}

#[tokio::test]
async fn manual_commit_then_finalize() {
    let harness = Harness::synced(SITE).await;
    let a = harness.piece("A").await;
    harness
        .engine
        .update_content(&a.id, None, paragraph("Manual"), None)
        .await
        .unwrap();

    let staged = harness.engine.stage().await.unwrap();
    let outcome = harness
        .engine
        .commit("manual", staged.additions.clone(), staged.deletions.clone())
        .await
        .unwrap();
    let CommitOutcome::Success(commit) = outcome else {
        panic!("expected success");
    };

    // Until finalized the store still shows the change as pending
    assert_eq!(harness.engine.status().await.unwrap().len(), 1);
    harness.engine.finalize_commit(staged, &commit).await.unwrap();
    assert!(harness.engine.status().await.unwrap().is_empty());
}

#[tokio::test]
async fn racing_commits_from_one_sync_point() {
    let harness = Harness::synced(SITE).await;
    let addition = |text: &str| {
        vec![FileAddition {
            path: "docs/a.md".into(),
            contents: text.into(),
        }]
    };

    let (first, second) = tokio::join!(
        harness.engine.commit("one", addition("one"), Vec::new()),
        harness.engine.commit("two", addition("two"), Vec::new()),
    );
    let outcomes = [first.unwrap(), second.unwrap()];
    let successes = outcomes
        .iter()
        .filter(|o| matches!(o, CommitOutcome::Success(_)))
        .count();
    assert_eq!(successes, 1);
    assert!(outcomes.contains(&CommitOutcome::Stale));
    assert_eq!(harness.provider.commits().len(), 2);
}
