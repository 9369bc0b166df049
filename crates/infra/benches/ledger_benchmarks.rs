use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use vault_core::{AccountId, Amount};
use vault_infra::audit_log::{AuditLog, EventFilter, InMemoryAuditLog};
use vault_infra::history::merge;
use vault_infra::history::{HistoryEntry, SortOrder};
use vault_infra::ledger::Ledger;
use vault_infra::projections::BalanceProjection;

fn seeded_ledger(accounts: usize, ops_per_account: usize) -> (Ledger<InMemoryAuditLog>, Vec<AccountId>) {
    let ledger = Ledger::new(InMemoryAuditLog::new());
    let ids: Vec<AccountId> = (0..accounts).map(|_| AccountId::new()).collect();

    for i in 0..ops_per_account {
        for id in &ids {
            ledger.deposit(*id, Amount::from_wei(10)).unwrap();
            if i % 2 == 1 {
                ledger.withdraw(*id, Amount::from_wei(5)).unwrap();
            }
        }
    }

    (ledger, ids)
}

fn bench_ledger_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_operations");
    group.throughput(Throughput::Elements(1));

    group.bench_function("deposit", |b| {
        let ledger = Ledger::new(InMemoryAuditLog::new());
        let account = AccountId::new();

        b.iter(|| {
            ledger.deposit(account, black_box(Amount::from_wei(1))).unwrap();
        });
    });

    group.bench_function("deposit_then_withdraw", |b| {
        let ledger = Ledger::new(InMemoryAuditLog::new());
        let account = AccountId::new();

        b.iter(|| {
            ledger.deposit(account, Amount::from_wei(2)).unwrap();
            ledger.withdraw(account, black_box(Amount::from_wei(1))).unwrap();
        });
    });

    group.bench_function("rejected_over_withdraw", |b| {
        let ledger = Ledger::new(InMemoryAuditLog::new());
        let account = AccountId::new();
        ledger.deposit(account, Amount::from_wei(1)).unwrap();

        b.iter(|| {
            black_box(ledger.withdraw(account, Amount::from_wei(2)).is_err());
        });
    });

    group.finish();
}

fn bench_cursor_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("audit_cursor_scan");

    for accounts in [1usize, 10, 100] {
        let (ledger, ids) = seeded_ledger(accounts, 100);
        let total = ledger.audit_log().head().unwrap();
        group.throughput(Throughput::Elements(total));

        group.bench_with_input(BenchmarkId::new("one_account", accounts), &ids[0], |b, id| {
            b.iter(|| {
                let count = ledger
                    .audit_log()
                    .events(EventFilter::for_account(*id))
                    .unwrap()
                    .count();
                black_box(count);
            });
        });
    }

    group.finish();
}

fn bench_projection_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("balance_projection_rebuild");

    for ops in [100usize, 1_000] {
        let (ledger, _) = seeded_ledger(10, ops);
        group.throughput(Throughput::Elements(ledger.audit_log().head().unwrap()));

        group.bench_with_input(BenchmarkId::new("rebuild", ops), &ledger, |b, ledger| {
            b.iter(|| black_box(BalanceProjection::rebuild_from(ledger.audit_log()).unwrap()));
        });
    }

    group.finish();
}

fn bench_history_merge(c: &mut Criterion) {
    let (ledger, ids) = seeded_ledger(1, 1_000);
    let entries: Vec<HistoryEntry> = ledger
        .audit_log()
        .events(EventFilter::for_account(ids[0]))
        .unwrap()
        .map(|e| HistoryEntry::from(&e.unwrap()))
        .collect();
    let (deposits, withdrawals): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| e.kind == vault_accounts::EventKind::Deposit);

    c.bench_function("history_merge_1500", |b| {
        b.iter(|| {
            black_box(merge(
                Some(deposits.clone()),
                Some(withdrawals.clone()),
                SortOrder::Descending,
            ))
        });
    });
}

criterion_group!(
    benches,
    bench_ledger_operations,
    bench_cursor_scan,
    bench_projection_rebuild,
    bench_history_merge
);
criterion_main!(benches);
