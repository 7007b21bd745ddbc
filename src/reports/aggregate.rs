//! Pure aggregation over expense sets fetched from the expense service.
//! Everything here is deterministic and independent of any I/O.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use time::Duration;

use crate::categories::repo::Category;
use crate::expenses::repo::Expense;
use crate::util;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    pub category_id: i32,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetOverrun {
    pub category_id: i32,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub budget: Decimal,
    pub spent: Decimal,
    pub exceeded_by: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub date: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl TrendPeriod {
    pub fn parse(value: &str) -> Option<TrendPeriod> {
        match value {
            "daily" => Some(TrendPeriod::Daily),
            "weekly" => Some(TrendPeriod::Weekly),
            "monthly" => Some(TrendPeriod::Monthly),
            _ => None,
        }
    }
}

pub fn total_spent(expenses: &[Expense]) -> Decimal {
    expenses.iter().map(|e| e.amount).sum()
}

/// Per-category totals, largest first. Ties keep the lower category id first
/// so the ordering is stable across runs.
pub fn group_by_category(expenses: &[Expense]) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<i32, Decimal> = BTreeMap::new();
    for expense in expenses {
        *totals.entry(expense.category_id).or_default() += expense.amount;
    }
    let mut out: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category_id, amount)| CategoryTotal {
            category_id,
            amount,
        })
        .collect();
    out.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.category_id.cmp(&b.category_id)));
    out
}

/// Share of `amount` in `total`, rounded to two decimals. An empty or zero
/// total divides by one instead, so every share comes out as zero rather
/// than NaN.
pub fn share_percentage(amount: Decimal, total: Decimal) -> f64 {
    let divisor = if total > Decimal::ZERO {
        total.to_f64().unwrap_or(1.0)
    } else {
        1.0
    };
    let share = amount.to_f64().unwrap_or(0.0) / divisor * 100.0;
    (share * 100.0).round() / 100.0
}

/// Categories whose monthly budget is smaller than what was actually spent,
/// most-exceeded first. Categories without a budget never appear.
pub fn budget_exceeded(totals: &[CategoryTotal], categories: &[Category]) -> Vec<BudgetOverrun> {
    let mut out: Vec<BudgetOverrun> = Vec::new();
    for total in totals {
        let Some(category) = categories.iter().find(|c| c.id == total.category_id) else {
            continue;
        };
        let Some(budget) = category.monthly_budget else {
            continue;
        };
        if budget <= Decimal::ZERO || total.amount <= budget {
            continue;
        }
        out.push(BudgetOverrun {
            category_id: category.id,
            name: category.name.clone(),
            icon: category.icon.clone(),
            color: category.color.clone(),
            budget,
            spent: total.amount,
            exceeded_by: total.amount - budget,
        });
    }
    out.sort_by(|a, b| b.exceeded_by.cmp(&a.exceeded_by));
    out
}

fn bucket_label(expense: &Expense, period: TrendPeriod) -> String {
    match period {
        TrendPeriod::Daily => util::format_date(expense.expense_date),
        TrendPeriod::Weekly => {
            // Weeks start on Sunday.
            let back = expense.expense_date.weekday().number_days_from_sunday();
            let start = expense.expense_date - Duration::days(i64::from(back));
            util::format_date(start)
        }
        TrendPeriod::Monthly => format!(
            "{:04}-{:02}",
            expense.expense_date.year(),
            u8::from(expense.expense_date.month())
        ),
    }
}

/// Spend totals per time bucket, oldest first. Bucket labels are `YYYY-MM-DD`
/// (the week's Sunday for weekly) or `YYYY-MM` for monthly, so lexicographic
/// order is chronological order.
pub fn trend_buckets(expenses: &[Expense], period: TrendPeriod) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<String, Decimal> = BTreeMap::new();
    for expense in expenses {
        *buckets.entry(bucket_label(expense, period)).or_default() += expense.amount;
    }
    buckets
        .into_iter()
        .map(|(date, amount)| TrendPoint { date, amount })
        .collect()
}

/// CSV export of an expense set. The description column is always quoted and
/// embedded quotes are doubled, so free text cannot break the row structure.
pub fn to_csv(expenses: &[Expense]) -> String {
    let mut out = String::from("id,categoryId,amount,description,expenseDate\n");
    for expense in expenses {
        let description = expense
            .description
            .as_deref()
            .unwrap_or("")
            .replace('"', "\"\"");
        out.push_str(&format!(
            "{},{},{},\"{}\",{}\n",
            expense.id,
            expense.category_id,
            expense.amount,
            description,
            util::format_date(expense.expense_date),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};
    use time::{Date, OffsetDateTime};

    fn expense(id: i32, category_id: i32, amount: &str, day: Date) -> Expense {
        let stamp: OffsetDateTime = datetime!(2026-08-01 00:00 UTC);
        Expense {
            id,
            user_id: 1,
            category_id,
            amount: amount.parse().unwrap(),
            description: None,
            expense_date: day,
            receipt_url: None,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    fn category(id: i32, name: &str, budget: Option<&str>) -> Category {
        Category {
            id,
            user_id: Some(1),
            name: name.to_string(),
            color: None,
            icon: None,
            monthly_budget: budget.map(|b| b.parse().unwrap()),
            is_default: false,
            created_at: datetime!(2026-01-01 00:00 UTC),
        }
    }

    #[test]
    fn groups_sort_largest_first() {
        let expenses = vec![
            expense(1, 2, "10.00", date!(2026 - 08 - 01)),
            expense(2, 1, "25.00", date!(2026 - 08 - 02)),
            expense(3, 2, "5.00", date!(2026 - 08 - 03)),
        ];
        let totals = group_by_category(&expenses);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].category_id, 1);
        assert_eq!(totals[0].amount, "25.00".parse().unwrap());
        assert_eq!(totals[1].category_id, 2);
        assert_eq!(totals[1].amount, "15.00".parse().unwrap());
    }

    #[test]
    fn share_percentage_rounds_and_survives_zero_total() {
        let third = share_percentage("10".parse().unwrap(), "30".parse().unwrap());
        assert_eq!(third, 33.33);
        assert_eq!(share_percentage("10".parse().unwrap(), Decimal::ZERO), 1000.0);
        assert_eq!(share_percentage(Decimal::ZERO, Decimal::ZERO), 0.0);
    }

    #[test]
    fn budget_exceeded_sorted_by_overrun() {
        let totals = vec![
            CategoryTotal {
                category_id: 1,
                amount: "120.00".parse().unwrap(),
            },
            CategoryTotal {
                category_id: 2,
                amount: "90.00".parse().unwrap(),
            },
            CategoryTotal {
                category_id: 3,
                amount: "40.00".parse().unwrap(),
            },
        ];
        let categories = vec![
            category(1, "Food", Some("100.00")),
            category(2, "Transport", Some("50.00")),
            category(3, "Fun", None),
        ];
        let overruns = budget_exceeded(&totals, &categories);
        assert_eq!(overruns.len(), 2);
        assert_eq!(overruns[0].category_id, 2);
        assert_eq!(overruns[0].exceeded_by, "40.00".parse().unwrap());
        assert_eq!(overruns[1].category_id, 1);
        assert_eq!(overruns[1].exceeded_by, "20.00".parse().unwrap());
    }

    #[test]
    fn within_budget_categories_are_skipped() {
        let totals = vec![CategoryTotal {
            category_id: 1,
            amount: "99.99".parse().unwrap(),
        }];
        let categories = vec![category(1, "Food", Some("100.00"))];
        assert!(budget_exceeded(&totals, &categories).is_empty());
    }

    #[test]
    fn daily_trend_ascends_by_date() {
        let expenses = vec![
            expense(1, 1, "5.00", date!(2026 - 08 - 03)),
            expense(2, 1, "7.00", date!(2026 - 08 - 01)),
            expense(3, 1, "1.00", date!(2026 - 08 - 03)),
        ];
        let points = trend_buckets(&expenses, TrendPeriod::Daily);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, "2026-08-01");
        assert_eq!(points[0].amount, "7.00".parse().unwrap());
        assert_eq!(points[1].date, "2026-08-03");
        assert_eq!(points[1].amount, "6.00".parse().unwrap());
    }

    #[test]
    fn weekly_buckets_start_on_sunday() {
        // 2026-08-12 is a Wednesday; its week starts Sunday 2026-08-09.
        let expenses = vec![
            expense(1, 1, "5.00", date!(2026 - 08 - 12)),
            expense(2, 1, "2.00", date!(2026 - 08 - 09)),
            expense(3, 1, "4.00", date!(2026 - 08 - 08)),
        ];
        let points = trend_buckets(&expenses, TrendPeriod::Weekly);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, "2026-08-02");
        assert_eq!(points[0].amount, "4.00".parse().unwrap());
        assert_eq!(points[1].date, "2026-08-09");
        assert_eq!(points[1].amount, "7.00".parse().unwrap());
    }

    #[test]
    fn monthly_buckets_use_year_month_labels() {
        let expenses = vec![
            expense(1, 1, "5.00", date!(2026 - 07 - 31)),
            expense(2, 1, "2.50", date!(2026 - 08 - 01)),
        ];
        let points = trend_buckets(&expenses, TrendPeriod::Monthly);
        assert_eq!(points[0].date, "2026-07");
        assert_eq!(points[1].date, "2026-08");
    }

    #[test]
    fn csv_quotes_descriptions() {
        let mut rows = vec![expense(1, 2, "9.99", date!(2026 - 08 - 05))];
        rows[0].description = Some("said \"hi\", left".to_string());
        let csv = to_csv(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "id,categoryId,amount,description,expenseDate");
        assert_eq!(lines[1], "1,2,9.99,\"said \"\"hi\"\", left\",2026-08-05");
    }

    #[test]
    fn csv_of_empty_set_is_just_the_header() {
        assert_eq!(to_csv(&[]), "id,categoryId,amount,description,expenseDate\n");
    }

    #[test]
    fn period_parse() {
        assert_eq!(TrendPeriod::parse("weekly"), Some(TrendPeriod::Weekly));
        assert_eq!(TrendPeriod::parse("hourly"), None);
    }
}
