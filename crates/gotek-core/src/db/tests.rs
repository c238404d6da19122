//! Database tests

use super::*;
use crate::budget::BudgetLevel;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_user(email: &str, phone: &str) -> NewUser {
        NewUser {
            name: "Siti".to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            password: "rahasia123".to_string(),
        }
    }

    fn setup() -> (Database, User) {
        let db = Database::in_memory().unwrap();
        let user = db
            .create_user(&new_user("siti@example.com", "081234567890"))
            .unwrap();
        (db, user)
    }

    fn expense(db: &Database, user: &User, category: &str, amount: i64, on: NaiveDate) -> Transaction {
        let cat = db
            .find_or_create_category(user.id, category, TransactionType::Expense)
            .unwrap();
        db.insert_transaction(
            user.id,
            &NewTransaction {
                category_id: cat.id,
                kind: TransactionType::Expense,
                amount,
                description: format!("belanja {}", category),
                payment_method: None,
                date: on,
                source: TransactionSource::Whatsapp,
            },
        )
        .unwrap()
    }

    fn income(db: &Database, user: &User, amount: i64, on: NaiveDate) -> Transaction {
        let cat = db
            .find_or_create_category(user.id, "Gaji", TransactionType::Income)
            .unwrap();
        db.insert_transaction(
            user.id,
            &NewTransaction {
                category_id: cat.id,
                kind: TransactionType::Income,
                amount,
                description: "gaji".to_string(),
                payment_method: Some("BCA".to_string()),
                date: on,
                source: TransactionSource::Dashboard,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_schema_tables_exist() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
                 ('users', 'categories', 'transactions', 'budgets', 'debts', 'inbound_messages', 'audit_log')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 7);
    }

    #[test]
    fn test_create_user_normalizes_and_seeds() {
        let (db, user) = setup();
        assert_eq!(user.phone, "6281234567890");
        assert_eq!(user.email, "siti@example.com");
        assert!(user.password_hash.starts_with("$argon2"));

        let categories = db.list_categories(user.id, None).unwrap();
        assert_eq!(
            categories.len(),
            DEFAULT_EXPENSE_CATEGORIES.len() + DEFAULT_INCOME_CATEGORIES.len()
        );
        let income = db
            .list_categories(user.id, Some(TransactionType::Income))
            .unwrap();
        assert!(income.iter().any(|c| c.name == "Gaji"));
    }

    #[test]
    fn test_create_user_rejects_duplicates_and_bad_input() {
        let (db, _) = setup();

        let dup_email = db.create_user(&new_user("SITI@example.com", "089999999999"));
        assert!(matches!(dup_email, Err(Error::Conflict(_))));

        let dup_phone = db.create_user(&new_user("other@example.com", "+62 812-3456-7890"));
        assert!(matches!(dup_phone, Err(Error::Conflict(_))));

        let bad_phone = db.create_user(&new_user("x@example.com", "12"));
        assert!(matches!(bad_phone, Err(Error::InvalidData(_))));

        let mut short = new_user("y@example.com", "087777777777");
        short.password = "pendek".to_string();
        assert!(matches!(db.create_user(&short), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_lookup_and_verify_password() {
        let (db, user) = setup();

        let by_phone = db.get_user_by_phone("+6281234567890").unwrap().unwrap();
        assert_eq!(by_phone.id, user.id);
        assert!(db.get_user_by_phone("not a phone").unwrap().is_none());

        assert!(db
            .verify_user_password("siti@example.com", "rahasia123")
            .unwrap()
            .is_some());
        assert!(db
            .verify_user_password("081234567890", "rahasia123")
            .unwrap()
            .is_some());
        assert!(db
            .verify_user_password("siti@example.com", "salah")
            .unwrap()
            .is_none());
        assert!(db
            .verify_user_password("nobody@example.com", "rahasia123")
            .unwrap()
            .is_none());

        db.update_user_password(user.id, "passwordbaru").unwrap();
        assert!(db
            .verify_user_password("siti@example.com", "passwordbaru")
            .unwrap()
            .is_some());
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_category_case_insensitive_and_delete_guard() {
        let (db, user) = setup();

        let a = db
            .find_or_create_category(user.id, "kopi", TransactionType::Expense)
            .unwrap();
        let b = db
            .find_or_create_category(user.id, "KOPI", TransactionType::Expense)
            .unwrap();
        assert_eq!(a.id, b.id);

        // Same name, other kind is a separate category
        let c = db
            .find_or_create_category(user.id, "Kopi", TransactionType::Income)
            .unwrap();
        assert_ne!(a.id, c.id);

        assert!(matches!(
            db.create_category(user.id, "Kopi", TransactionType::Expense),
            Err(Error::Conflict(_))
        ));

        expense(&db, &user, "kopi", 20_000, date(2026, 10, 1));
        assert!(matches!(
            db.delete_category(user.id, a.id),
            Err(Error::Conflict(_))
        ));
        db.delete_category(user.id, c.id).unwrap();
        assert!(matches!(
            db.delete_category(user.id, c.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_transaction_crud_and_ownership() {
        let (db, user) = setup();
        let other = db
            .create_user(&new_user("budi@example.com", "082222222222"))
            .unwrap();

        let tx = expense(&db, &user, "Transportasi", 15_000, date(2026, 10, 3));
        assert_eq!(tx.category_name, "Transportasi");
        assert_eq!(tx.source, TransactionSource::Whatsapp);

        assert!(db.get_transaction(other.id, tx.id).unwrap().is_none());
        assert!(matches!(
            db.delete_transaction(other.id, tx.id),
            Err(Error::NotFound(_))
        ));

        db.delete_transaction(user.id, tx.id).unwrap();
        assert!(db.get_transaction(user.id, tx.id).unwrap().is_none());
    }

    #[test]
    fn test_insert_transaction_validates_category() {
        let (db, user) = setup();
        let gaji = db
            .find_category(user.id, "Gaji", TransactionType::Income)
            .unwrap()
            .unwrap();

        let result = db.insert_transaction(
            user.id,
            &NewTransaction {
                category_id: gaji.id,
                kind: TransactionType::Expense,
                amount: 10_000,
                description: "salah".to_string(),
                payment_method: None,
                date: date(2026, 10, 1),
                source: TransactionSource::Dashboard,
            },
        );
        assert!(matches!(result, Err(Error::InvalidData(_))));

        let result = db.insert_transaction(
            user.id,
            &NewTransaction {
                category_id: gaji.id,
                kind: TransactionType::Income,
                amount: 0,
                description: String::new(),
                payment_method: None,
                date: date(2026, 10, 1),
                source: TransactionSource::Dashboard,
            },
        );
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_list_filter_and_count() {
        let (db, user) = setup();
        expense(&db, &user, "Belanja", 100_000, date(2026, 9, 30));
        expense(&db, &user, "Belanja", 50_000, date(2026, 10, 2));
        expense(&db, &user, "Hiburan", 75_000, date(2026, 10, 5));
        income(&db, &user, 5_000_000, date(2026, 10, 1));

        let october = TransactionFilter {
            month: Some(Month::new(2026, 10).unwrap()),
            ..Default::default()
        };
        let listed = db.list_transactions(user.id, &october).unwrap();
        assert_eq!(listed.len(), 3);
        // Newest first
        assert_eq!(listed[0].date, date(2026, 10, 5));
        assert_eq!(db.count_transactions(user.id, &october).unwrap(), 3);

        let expenses = TransactionFilter {
            kind: Some(TransactionType::Expense),
            limit: 2,
            ..Default::default()
        };
        assert_eq!(db.list_transactions(user.id, &expenses).unwrap().len(), 2);
        assert_eq!(db.count_transactions(user.id, &expenses).unwrap(), 3);

        let page2 = TransactionFilter {
            limit: 2,
            offset: 2,
            ..Default::default()
        };
        assert_eq!(db.list_transactions(user.id, &page2).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_last_transaction() {
        let (db, user) = setup();
        assert!(db.delete_last_transaction(user.id).unwrap().is_none());

        expense(&db, &user, "Belanja", 10_000, date(2026, 10, 9));
        let last = expense(&db, &user, "Belanja", 20_000, date(2026, 10, 1));

        let removed = db.delete_last_transaction(user.id).unwrap().unwrap();
        assert_eq!(removed.id, last.id);
        assert_eq!(
            db.count_transactions(user.id, &TransactionFilter::default())
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_monthly_summary() {
        let (db, user) = setup();
        income(&db, &user, 5_000_000, date(2026, 10, 1));
        expense(&db, &user, "Belanja", 300_000, date(2026, 10, 2));
        expense(&db, &user, "Belanja", 200_000, date(2026, 10, 20));
        expense(&db, &user, "Hiburan", 100_000, date(2026, 10, 31));
        expense(&db, &user, "Hiburan", 999_000, date(2026, 11, 1));

        let summary = db
            .monthly_summary(user.id, Month::new(2026, 10).unwrap())
            .unwrap();
        assert_eq!(summary.income, 5_000_000);
        assert_eq!(summary.expense, 600_000);
        assert_eq!(summary.balance, 4_400_000);

        let belanja = summary
            .by_category
            .iter()
            .find(|c| c.category_name == "Belanja")
            .unwrap();
        assert_eq!(belanja.total, 500_000);
        assert_eq!(belanja.count, 2);
    }

    #[test]
    fn test_budget_upsert_and_status() {
        let (db, user) = setup();
        let cat = db
            .find_or_create_category(user.id, "Hiburan", TransactionType::Expense)
            .unwrap();

        db.upsert_budget(user.id, cat.id, 100_000).unwrap();
        let budget = db.upsert_budget(user.id, cat.id, 200_000).unwrap();
        assert_eq!(budget.amount, 200_000);
        assert_eq!(db.list_budgets(user.id).unwrap().len(), 1);

        let on = date(2026, 10, 15);
        let status = db.check_budget_status(user.id, cat.id, on).unwrap().unwrap();
        assert_eq!(status.level, BudgetLevel::Safe);

        expense(&db, &user, "Hiburan", 160_000, date(2026, 10, 1));
        // Last month's spending does not count
        expense(&db, &user, "Hiburan", 500_000, date(2026, 9, 30));
        let status = db.check_budget_status(user.id, cat.id, on).unwrap().unwrap();
        assert_eq!(status.spent, 160_000);
        assert_eq!(status.level, BudgetLevel::Warning);

        expense(&db, &user, "Hiburan", 40_001, date(2026, 10, 31));
        let status = db.check_budget_status(user.id, cat.id, on).unwrap().unwrap();
        assert_eq!(status.level, BudgetLevel::Exceeded);

        let reports = db
            .list_budget_statuses(user.id, Month::new(2026, 10).unwrap())
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status.level, BudgetLevel::Exceeded);

        let other = db
            .find_or_create_category(user.id, "Belanja", TransactionType::Expense)
            .unwrap();
        assert!(db
            .check_budget_status(user.id, other.id, on)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_budget_rejects_income_category() {
        let (db, user) = setup();
        let gaji = db
            .find_category(user.id, "Gaji", TransactionType::Income)
            .unwrap()
            .unwrap();
        assert!(matches!(
            db.upsert_budget(user.id, gaji.id, 100_000),
            Err(Error::InvalidData(_))
        ));

        let budget_id = {
            let cat = db
                .find_or_create_category(user.id, "Belanja", TransactionType::Expense)
                .unwrap();
            db.upsert_budget(user.id, cat.id, 50_000).unwrap().id
        };
        db.delete_budget(user.id, budget_id).unwrap();
        assert!(matches!(
            db.delete_budget(user.id, budget_id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_debt_lifecycle() {
        let (db, user) = setup();
        let debt = db
            .insert_debt(
                user.id,
                &NewDebt {
                    kind: DebtKind::Payable,
                    counterparty: "Budi".to_string(),
                    amount: 150_000,
                    description: String::new(),
                    due_date: Some(date(2026, 11, 1)),
                },
            )
            .unwrap();
        assert_eq!(debt.description, "Hutang");
        assert_eq!(debt.status, DebtStatus::Unpaid);

        db.insert_debt(
            user.id,
            &NewDebt {
                kind: DebtKind::Receivable,
                counterparty: "Rina".to_string(),
                amount: 75_000,
                description: "makan siang".to_string(),
                due_date: None,
            },
        )
        .unwrap();

        let unpaid = db.list_debts(user.id, Some(DebtStatus::Unpaid)).unwrap();
        assert_eq!(unpaid.len(), 2);
        // Dated debts first
        assert_eq!(unpaid[0].id, debt.id);

        let paid = db.mark_debt_paid(user.id, debt.id).unwrap();
        assert_eq!(paid.status, DebtStatus::Paid);
        assert!(paid.paid_at.is_some());
        assert!(matches!(
            db.mark_debt_paid(user.id, debt.id),
            Err(Error::Conflict(_))
        ));

        assert_eq!(
            db.list_debts(user.id, Some(DebtStatus::Unpaid)).unwrap().len(),
            1
        );
        db.delete_debt(user.id, debt.id).unwrap();
        assert_eq!(db.list_debts(user.id, None).unwrap().len(), 1);
    }

    #[test]
    fn test_debts_due_for_reminder() {
        let (db, user) = setup();
        let new_debt = |counterparty: &str, due: Option<NaiveDate>| NewDebt {
            kind: DebtKind::Payable,
            counterparty: counterparty.to_string(),
            amount: 10_000,
            description: String::new(),
            due_date: due,
        };

        let overdue = db
            .insert_debt(user.id, &new_debt("A", Some(date(2026, 10, 10))))
            .unwrap();
        let tomorrow = db
            .insert_debt(user.id, &new_debt("B", Some(date(2026, 10, 17))))
            .unwrap();
        db.insert_debt(user.id, &new_debt("C", Some(date(2026, 10, 30))))
            .unwrap();
        db.insert_debt(user.id, &new_debt("D", None)).unwrap();

        let today = date(2026, 10, 16);
        let due = db.debts_due_for_reminder(today, 1).unwrap();
        let ids: Vec<i64> = due.iter().map(|r| r.debt.id).collect();
        assert_eq!(ids, vec![overdue.id, tomorrow.id]);
        assert_eq!(due[0].phone, "6281234567890");

        // Huge look-ahead windows are clamped, not overflowed
        assert_eq!(db.debts_due_for_reminder(today, i64::MAX).unwrap().len(), 3);
        assert!(db.debts_due_for_reminder(NaiveDate::MAX, 30).is_ok());

        db.mark_debt_reminded(overdue.id).unwrap();
        db.mark_debt_paid(user.id, tomorrow.id).unwrap();
        assert!(db.debts_due_for_reminder(today, 1).unwrap().is_empty());
    }

    #[test]
    fn test_inbound_message_dedupe() {
        let db = Database::in_memory().unwrap();
        assert!(db.record_inbound_message("wamid.ABC").unwrap());
        assert!(!db.record_inbound_message("wamid.ABC").unwrap());
        assert!(db.record_inbound_message("wamid.DEF").unwrap());
    }

    #[test]
    fn test_audit_log() {
        let db = Database::in_memory().unwrap();
        db.log_audit("siti@example.com", "login", None, None, None)
            .unwrap();
        db.log_audit("system", "debt_reminder", Some("debt"), Some(4), Some("sent"))
            .unwrap();

        let entries = db.list_audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "debt_reminder");
        assert_eq!(entries[0].entity_id, Some(4));
    }
}
