//! Integration tests for gotek-core
//!
//! These tests exercise the full message → store → budget alert workflow.

use chrono::NaiveDate;
use gotek_core::{
    db::Database,
    models::{DebtStatus, Month, NewUser, TransactionFilter, TransactionSource, TransactionType},
    AIClient, Bot, BotAction, BudgetLevel, TransactionExportOptions,
};

const PHONE: &str = "6285712345678";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn register(db: &Database) -> i64 {
    db.create_user(&NewUser {
        name: "Dimas".into(),
        email: "dimas@example.com".into(),
        phone: "+62 857-1234-5678".into(),
        password: "kopi-susu-gula-aren".into(),
    })
    .expect("Failed to register user")
    .id
}

#[tokio::test]
async fn test_chat_month_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let user_id = register(&db);
    let bot = Bot::new(db.clone(), None).with_today(today());

    let messages = [
        "+7,5jt gaji oktober @Gaji #BCA",
        "budget @Makanan & Minuman 1jt",
        "-350rb belanja mingguan @Makanan & Minuman #Debit BCA",
        "-25.000 kopi @Makanan & Minuman",
        "beli 2 nasi padang 50k @Makanan & Minuman",
        "-200rb bensin @Transportasi",
    ];
    for message in messages {
        let reply = bot.handle_text(PHONE, message).await.unwrap();
        assert_ne!(reply.action, BotAction::FormatHint, "{}", message);
    }

    let summary = db.monthly_summary(user_id, Month::of(today())).unwrap();
    assert_eq!(summary.income, 7_500_000);
    assert_eq!(summary.expense, 625_000);
    assert_eq!(summary.balance, 6_875_000);

    // 425k of 1jt spent: safe
    let reports = db.list_budget_statuses(user_id, Month::of(today())).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status.level, BudgetLevel::Safe);
    assert_eq!(reports[0].status.spent, 425_000);

    // Crossing 80% adds the warning to the confirmation
    let reply = bot
        .handle_text(PHONE, "-400rb makan keluarga @makanan & minuman")
        .await
        .unwrap();
    assert!(reply.text.contains("⚠️"), "{}", reply.text);

    // Going over adds the over-limit alert
    let reply = bot
        .handle_text(PHONE, "-200rb traktir @Makanan & Minuman")
        .await
        .unwrap();
    assert!(reply.text.contains("🚨"), "{}", reply.text);

    let filter = TransactionFilter {
        month: Some(Month::of(today())),
        kind: Some(TransactionType::Expense),
        ..Default::default()
    };
    assert_eq!(db.count_transactions(user_id, &filter).unwrap(), 6);

    let csv = db
        .export_transactions_csv(
            user_id,
            &TransactionExportOptions {
                month: Some(Month::of(today())),
            },
        )
        .unwrap();
    // Header plus one income and six expenses
    assert_eq!(csv.lines().count(), 8);
}

#[tokio::test]
async fn test_budget_is_monthly() {
    let db = Database::in_memory().unwrap();
    let user_id = register(&db);

    let september = Bot::new(db.clone(), None)
        .with_today(NaiveDate::from_ymd_opt(2026, 9, 30).unwrap());
    september
        .handle_text(PHONE, "budget @Hiburan 100rb")
        .await
        .unwrap();
    let reply = september
        .handle_text(PHONE, "-150rb konser @Hiburan")
        .await
        .unwrap();
    assert!(reply.text.contains("🚨"));

    // A new month starts from zero against the same limit
    let october = Bot::new(db.clone(), None).with_today(today());
    let reply = october
        .handle_text(PHONE, "-50rb bioskop @Hiburan")
        .await
        .unwrap();
    assert!(!reply.text.contains("🚨"));
    assert!(!reply.text.contains("⚠️"));

    let hiburan = db
        .find_category(user_id, "Hiburan", TransactionType::Expense)
        .unwrap()
        .unwrap();
    let status = db
        .check_budget_status(user_id, hiburan.id, today())
        .unwrap()
        .unwrap();
    assert_eq!(status.spent, 50_000);
    assert_eq!(status.level, BudgetLevel::Safe);
}

#[tokio::test]
async fn test_debts_and_reminders() {
    let db = Database::in_memory().unwrap();
    let user_id = register(&db);
    let bot = Bot::new(db.clone(), None).with_today(today());

    let reply = bot
        .handle_text(PHONE, "hutang 300rb ke Mas Joko servis motor !17/10")
        .await
        .unwrap();
    let BotAction::Debt { id: due_soon } = reply.action else {
        panic!("expected debt: {}", reply.text);
    };
    bot.handle_text(PHONE, "piutang 1jt @Bu Wati !2026-12-01")
        .await
        .unwrap();

    let reminders = db.debts_due_for_reminder(today(), 1).unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].debt.id, due_soon);
    assert_eq!(reminders[0].debt.counterparty, "Mas Joko");
    assert_eq!(reminders[0].phone, PHONE);

    db.mark_debt_reminded(due_soon).unwrap();
    assert!(db.debts_due_for_reminder(today(), 1).unwrap().is_empty());

    bot.handle_text(PHONE, &format!("lunas {}", due_soon))
        .await
        .unwrap();
    let unpaid = db.list_debts(user_id, Some(DebtStatus::Unpaid)).unwrap();
    assert_eq!(unpaid.len(), 1);
    assert_eq!(unpaid[0].counterparty, "Bu Wati");
}

#[tokio::test]
async fn test_ai_fallback_with_mock_backend() {
    let db = Database::in_memory().unwrap();
    let user_id = register(&db);
    let bot = Bot::new(db.clone(), Some(AIClient::mock())).with_today(today());

    let reply = bot
        .handle_text(PHONE, "barusan isi bensin gocap")
        .await
        .unwrap();
    let BotAction::Transaction { id } = reply.action else {
        panic!("expected transaction: {}", reply.text);
    };
    let tx = db.get_transaction(user_id, id).unwrap().unwrap();
    assert_eq!(tx.amount, 50_000);
    assert_eq!(tx.category_name, "Transportasi");
    assert_eq!(tx.source, TransactionSource::Ai);
}

#[cfg(feature = "test-utils")]
mod with_mock_server {
    use super::*;
    use gotek_core::test_utils::MockAIServer;
    use gotek_core::OpenAICompatibleBackend;

    #[tokio::test]
    async fn test_ai_fallback_over_http() {
        let server = MockAIServer::start().await;
        let db = Database::in_memory().unwrap();
        let user_id = register(&db);
        let ai = AIClient::OpenAICompatible(OpenAICompatibleBackend::with_api_key(
            &server.url(),
            "qwen-plus",
            "sk-test",
        ));
        let bot = Bot::new(db.clone(), Some(ai)).with_today(today());

        let reply = bot.handle_text(PHONE, "bayar apa ya tadi").await.unwrap();
        assert_eq!(reply.action, BotAction::FormatHint);
        assert_eq!(server.requests().len(), 1);

        let reply = bot.handle_text(PHONE, "-15rb sabun").await.unwrap();
        assert!(matches!(reply.action, BotAction::Transaction { .. }));
        assert_eq!(server.requests().len(), 1);
        assert_eq!(
            db.count_transactions(user_id, &TransactionFilter::default())
                .unwrap(),
            1
        );
    }
}
