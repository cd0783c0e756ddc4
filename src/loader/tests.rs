use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use parking_lot::Mutex;

use super::*;
use crate::cache::{AccessEntry, DefaultSecurityCache, SecurityCache, ShadowEntry};
use crate::error::AuthorizationError;
use crate::memory::MemoryRuleStore;
use crate::rules::{Access, DefaultAuthorizationSettler, Right, RuleState, SecurityRule};

/// Wraps the default cache to record access insertions and inject failures.
#[derive(Default)]
struct InstrumentedCache {
    inner: DefaultSecurityCache,
    offered: Mutex<Vec<(Arc<AccessEntry>, Option<SecurityReference>)>>,
    reject_access: AtomicBool,
    conflict_rules: AtomicBool,
    evict_entity: AtomicBool,
}

impl SecurityCache for InstrumentedCache {
    fn add_rule_entry(&self, entry: Arc<RuleEntry>) -> Result<()> {
        if self.conflict_rules.load(Ordering::SeqCst) {
            let other = RuleEntry::new(
                entry.reference().clone(),
                vec![SecurityRule::deny([Right::View])],
            );
            self.inner.add_rule_entry(Arc::new(other))?;
        }
        self.inner.add_rule_entry(entry)
    }

    fn add_identity_rule_entry(&self, entry: Arc<RuleEntry>, groups: &[SecurityReference]) -> Result<()> {
        self.inner.add_identity_rule_entry(entry, groups)
    }

    fn add_shadow_entry(&self, entry: Arc<ShadowEntry>, groups: &[SecurityReference]) -> Result<()> {
        self.inner.add_shadow_entry(entry, groups)
    }

    fn add_access_entry(
        &self,
        entry: Arc<AccessEntry>,
        scope_wiki: Option<&SecurityReference>,
    ) -> Result<Option<String>> {
        self.offered
            .lock()
            .push((Arc::clone(&entry), scope_wiki.cloned()));
        if self.evict_entity.load(Ordering::SeqCst) {
            self.inner.remove(entry.entity());
        }
        if self.reject_access.load(Ordering::SeqCst) {
            return Err(AuthorizationError::ConflictingInsertion(entry.entity().to_string()));
        }
        self.inner.add_access_entry(entry, scope_wiki)
    }

    fn get(&self, reference: &SecurityReference) -> Option<Arc<RuleEntry>> {
        self.inner.get(reference)
    }

    fn get_shadow(&self, identity: &SecurityReference, wiki: &SecurityReference) -> Option<Arc<ShadowEntry>> {
        self.inner.get_shadow(identity, wiki)
    }

    fn get_access(&self, user: &SecurityReference, entity: &SecurityReference) -> Option<Arc<AccessEntry>> {
        self.inner.get_access(user, entity)
    }

    fn remove(&self, reference: &SecurityReference) {
        self.inner.remove(reference)
    }

    fn remove_access(&self, user: &SecurityReference, entity: &SecurityReference) {
        self.inner.remove_access(user, entity)
    }
}

impl InstrumentedCache {
    /// Insertions repeating an entry already offered.
    fn fallbacks(&self) -> usize {
        let offered = self.offered.lock();
        offered
            .iter()
            .enumerate()
            .filter(|(i, (entry, _))| offered[..*i].iter().any(|(seen, _)| Arc::ptr_eq(seen, entry)))
            .count()
    }

    /// Scope of every access insertion, in order.
    fn scopes(&self) -> Vec<Option<SecurityReference>> {
        self.offered.lock().iter().map(|(_, scope)| scope.clone()).collect()
    }
}

/// Settles with the default policy, keeping what it was given.
#[derive(Default)]
struct RecordingSettler {
    calls: Mutex<Vec<(HashSet<SecurityReference>, Vec<Arc<RuleEntry>>)>>,
}

impl AuthorizationSettler for RecordingSettler {
    fn settle(
        &self,
        user: &SecurityReference,
        groups: &HashSet<SecurityReference>,
        hierarchy: &[Arc<RuleEntry>],
    ) -> Result<Access> {
        self.calls.lock().push((groups.clone(), hierarchy.to_vec()));
        DefaultAuthorizationSettler.settle(user, groups, hierarchy)
    }
}

/// Counts resolver calls.
struct CountingGroups {
    store: Arc<MemoryRuleStore>,
    calls: AtomicUsize,
}

impl GroupResolver for CountingGroups {
    fn get_all_groups_for(
        &self,
        user: &SecurityReference,
        wiki: &SecurityReference,
    ) -> Result<HashSet<SecurityReference>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.store.get_all_groups_for(user, wiki)
    }
}

struct FailingReader;

impl SecurityEntryReader for FailingReader {
    fn read(&self, _reference: &SecurityReference) -> Result<RuleEntry> {
        Err(anyhow::anyhow!("rule store offline").into())
    }
}

struct Fixture {
    store: Arc<MemoryRuleStore>,
    cache: Arc<InstrumentedCache>,
    groups: Arc<CountingGroups>,
    settler: Arc<RecordingSettler>,
    loader: CacheLoader,
}

impl Fixture {
    fn new() -> Self {
        crate::init_test_tracing();
        let store = Arc::new(MemoryRuleStore::new(EntityReference::wiki("xwiki")));
        let cache = Arc::new(InstrumentedCache::default());
        let groups = Arc::new(CountingGroups {
            store: Arc::clone(&store),
            calls: AtomicUsize::new(0),
        });
        let settler = Arc::new(RecordingSettler::default());
        let loader = CacheLoader::new(cache.clone(), store.clone(), settler.clone(), groups.clone());
        Self {
            store,
            cache,
            groups,
            settler,
            loader,
        }
    }

    fn entity(&self, reference: &EntityReference) -> SecurityReference {
        self.store.factory().entity(reference)
    }

    fn user(&self, reference: &EntityReference) -> SecurityReference {
        self.store.factory().user(Some(reference))
    }
}

fn profile(wiki: &str, name: &str) -> EntityReference {
    EntityReference::document_in(wiki, &["XWiki"], name)
}

#[test]
fn test_load_settles_cached_hierarchy() {
    let fixture = Fixture::new();
    let alice_doc = profile("xwiki", "Alice");
    let alice = fixture.user(&alice_doc);
    let page = EntityReference::document_in("xwiki", &["Main"], "Page");
    let doc = fixture.entity(&page);
    let space = doc.parent().unwrap().clone();
    let root = fixture.store.factory().main_wiki().clone();

    let root_rules = Arc::new(RuleEntry::new(
        root.clone(),
        vec![SecurityRule::allow([Right::Comment]).user(alice_doc.clone())],
    ));
    let space_rules = Arc::new(RuleEntry::new(
        space.clone(),
        vec![SecurityRule::allow([Right::View, Right::Edit]).user(alice_doc.clone())],
    ));
    let doc_rules = Arc::new(RuleEntry::new(
        doc.clone(),
        vec![SecurityRule::deny([Right::Edit]).user(alice_doc)],
    ));
    for entry in [&root_rules, &space_rules, &doc_rules] {
        fixture.cache.add_rule_entry(Arc::clone(entry)).unwrap();
    }

    let loaded = fixture.loader.load(&alice, &doc).unwrap();
    let expected = DefaultAuthorizationSettler
        .settle(&alice, &HashSet::new(), &[doc_rules, space_rules, root_rules])
        .unwrap();

    assert_eq!(loaded.access(), &expected);
    assert!(loaded.access().allows(Right::View));
    assert_eq!(loaded.access().get(Right::Edit), RuleState::Deny);
    assert!(loaded.access().allows(Right::Comment));
    assert_eq!(fixture.store.read_count(&doc), 0);
    assert!(Arc::ptr_eq(&fixture.cache.get_access(&alice, &doc).unwrap(), &loaded));
    assert_eq!(fixture.cache.fallbacks(), 0);

    fixture.cache.remove_access(&alice, &doc);

    let barrier = Barrier::new(2);
    let decisions: Vec<Arc<AccessEntry>> = thread::scope(|scope| {
        let mut handles = Vec::new();
        for _ in 0..2 {
            handles.push(scope.spawn(|| {
                barrier.wait();
                fixture.loader.load(&alice, &doc).unwrap()
            }));
        }
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(decisions[0].access(), &expected);
    assert_eq!(decisions[1].access(), &expected);
    assert_eq!(fixture.cache.fallbacks(), 1);

    let cached = fixture.cache.get_access(&alice, &doc).unwrap();
    assert!(decisions.iter().any(|decision| Arc::ptr_eq(decision, &cached)));
}

#[test]
fn test_rejected_access_is_still_returned() {
    let fixture = Fixture::new();
    let alice = fixture.user(&profile("xwiki", "Alice"));
    let doc = fixture.entity(&EntityReference::document_in("xwiki", &["Main"], "Page"));
    fixture.cache.reject_access.store(true, Ordering::SeqCst);

    let loaded = fixture.loader.load(&alice, &doc).unwrap();

    assert_eq!(loaded.user(), &alice);
    assert_eq!(fixture.cache.fallbacks(), 1);
    assert!(fixture.cache.get_access(&alice, &doc).is_none());
    assert!(fixture.cache.get(&doc).is_some());
}

#[test]
fn test_rule_conflict_propagates() {
    let fixture = Fixture::new();
    let alice = fixture.user(&profile("xwiki", "Alice"));
    let doc = fixture.entity(&EntityReference::document_in("xwiki", &["Main"], "Page"));
    fixture.cache.conflict_rules.store(true, Ordering::SeqCst);

    let err = fixture.loader.load(&alice, &doc).unwrap_err();

    assert!(matches!(err, AuthorizationError::ConflictingInsertion(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_parent_evicted_propagates() {
    let fixture = Fixture::new();
    let alice = fixture.user(&profile("xwiki", "Alice"));
    let doc = fixture.entity(&EntityReference::document_in("xwiki", &["Main"], "Page"));
    fixture.cache.evict_entity.store(true, Ordering::SeqCst);

    let err = fixture.loader.load(&alice, &doc).unwrap_err();

    assert!(matches!(err, AuthorizationError::ParentEvicted(_)));
    assert!(err.is_retryable());
    assert_eq!(fixture.cache.fallbacks(), 0);
}

#[test]
fn test_reader_failure_propagates() {
    let cache = Arc::new(DefaultSecurityCache::default());
    let store = Arc::new(MemoryRuleStore::new(EntityReference::wiki("xwiki")));
    let loader = CacheLoader::new(
        cache.clone(),
        Arc::new(FailingReader),
        Arc::new(DefaultAuthorizationSettler),
        store.clone(),
    );
    let alice = store.factory().user(Some(&profile("xwiki", "Alice")));
    let doc = store
        .factory()
        .entity(&EntityReference::document_in("xwiki", &["Main"], "Page"));

    let err = loader.load(&alice, &doc).unwrap_err();

    assert!(matches!(err, AuthorizationError::External(_)));
    assert_eq!(cache.entry_count(), 0);
}

#[test]
fn test_guest_in_subwiki_has_no_groups() {
    let fixture = Fixture::new();
    let guest = fixture.store.factory().guest();
    let doc = fixture.entity(&EntityReference::document_in("sub", &["Main"], "Page"));
    let sub = doc.wiki_reference().clone();
    fixture
        .store
        .add_rule(&EntityReference::wiki("sub"), SecurityRule::allow([Right::View]));

    let loaded = fixture.loader.load(&guest, &doc).unwrap();

    assert_eq!(fixture.groups.calls.load(Ordering::SeqCst), 0);
    let calls = fixture.settler.calls.lock();
    let (groups, hierarchy) = &calls[0];
    assert!(groups.is_empty());
    let levels: Vec<_> = hierarchy.iter().map(|entry| entry.reference().clone()).collect();
    assert_eq!(levels.len(), 4);
    assert_eq!(levels[0], doc);
    assert_eq!(levels[2], sub);
    assert_eq!(&levels[3], fixture.store.factory().main_wiki());
    assert_eq!(guest.wiki_reference(), fixture.store.factory().main_wiki());
    assert!(fixture.cache.get(&guest).is_some());
    assert!(fixture.cache.get_shadow(&guest, &sub).is_some());
    assert!(Arc::ptr_eq(&fixture.cache.get_access(&guest, &doc).unwrap(), &loaded));
}

#[test]
fn test_global_user_in_subwiki_is_shadowed() {
    let fixture = Fixture::new();
    let alice_doc = profile("xwiki", "Alice");
    let admins_doc = profile("xwiki", "Admins");
    let team_doc = profile("sub", "Team");
    fixture.store.add_member(&admins_doc, &alice_doc);
    fixture.store.add_member(&team_doc, &alice_doc);
    fixture.store.add_rule(
        &EntityReference::wiki("sub"),
        SecurityRule::allow([Right::Edit]).group(team_doc.clone()),
    );

    let alice = fixture.user(&alice_doc);
    let admins = fixture.store.factory().group(&admins_doc);
    let team = fixture.store.factory().group(&team_doc);
    let doc = fixture.entity(&EntityReference::document_in("sub", &["Main"], "Page"));
    let sub = doc.wiki_reference().clone();

    let loaded = fixture.loader.load(&alice, &doc).unwrap();

    assert!(loaded.access().allows(Right::Edit));
    assert!(fixture.cache.get(&alice).is_some());
    assert!(fixture.cache.get(&admins).is_some());
    assert!(fixture.cache.get(&team).is_some());
    assert!(fixture.cache.get_shadow(&alice, &sub).is_some());
    assert!(fixture.cache.get_shadow(&admins, &sub).is_some());
    assert!(fixture.cache.get_access(&alice, &doc).is_some());

    // Dropping the subwiki group drops the shadow and the access below it.
    fixture.cache.remove(&team);
    assert!(fixture.cache.get_shadow(&alice, &sub).is_none());
    assert!(fixture.cache.get_access(&alice, &doc).is_none());
    assert!(fixture.cache.get(&alice).is_some());
}

#[test]
fn test_local_user_in_foreign_wiki_is_not_cached() {
    let fixture = Fixture::new();
    let bob = fixture.user(&profile("sub", "Bob"));
    let doc = fixture.entity(&EntityReference::document_in("xwiki", &["Main"], "Page"));

    let loaded = fixture.loader.load(&bob, &doc).unwrap();

    assert_eq!(loaded.entity(), &doc);
    assert!(fixture.cache.get_access(&bob, &doc).is_none());
    assert!(fixture.cache.get(&bob).is_none());
    assert!(fixture.cache.get(&doc).is_some());
}

#[test]
fn test_second_load_reads_nothing() {
    let fixture = Fixture::new();
    let alice_doc = profile("xwiki", "Alice");
    let editors_doc = profile("xwiki", "Editors");
    fixture.store.add_member(&editors_doc, &alice_doc);
    let alice = fixture.user(&alice_doc);
    let editors = fixture.store.factory().group(&editors_doc);
    let doc = fixture.entity(&EntityReference::document_in("xwiki", &["Main"], "Page"));

    fixture.loader.load(&alice, &doc).unwrap();
    fixture.loader.load(&alice, &doc).unwrap();

    assert_eq!(fixture.store.read_count(&doc), 1);
    assert_eq!(fixture.store.read_count(&alice), 1);
    assert_eq!(fixture.store.read_count(&editors), 1);
    assert_eq!(fixture.store.read_count(fixture.store.factory().main_wiki()), 1);
}

#[test]
fn test_access_scoped_only_outside_home_wiki() {
    let fixture = Fixture::new();
    let alice = fixture.user(&profile("xwiki", "Alice"));
    let main_doc = fixture.entity(&EntityReference::document_in("xwiki", &["Main"], "Page"));
    let sub_doc = fixture.entity(&EntityReference::document_in("sub", &["Main"], "Page"));
    let sub = sub_doc.wiki_reference().clone();

    fixture.loader.load(&alice, &main_doc).unwrap();
    fixture.loader.load(&alice, &sub_doc).unwrap();

    assert_eq!(fixture.cache.scopes(), vec![None, Some(sub)]);
    assert_eq!(fixture.cache.fallbacks(), 0);
    assert!(fixture.cache.get_access(&alice, &main_doc).is_some());
    assert!(fixture.cache.get_access(&alice, &sub_doc).is_some());
}
