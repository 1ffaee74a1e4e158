use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

/// Price per kilogram by item label. Read-only once the session starts.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceTable {
    per_kg: BTreeMap<String, f64>,
}

impl PriceTable {
    pub fn new(per_kg: BTreeMap<String, f64>) -> Self {
        Self { per_kg }
    }

    /// Price per kilogram; labels missing from the table cost nothing.
    pub fn price_per_kg(&self, label: &str) -> f64 {
        self.per_kg.get(label).copied().unwrap_or(0.0)
    }

    /// Total price for `weight_kg` of `label`. Not rounded.
    pub fn price(&self, label: &str, weight_kg: f64) -> f64 {
        weight_kg * self.price_per_kg(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.per_kg.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.per_kg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_kg.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        for (label, price) in &self.per_kg {
            if !price.is_finite() || *price < 0.0 {
                return Err(anyhow!(
                    "price for '{}' must be a non-negative number, got {}",
                    label,
                    price
                ));
            }
        }
        Ok(())
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        let per_kg = [
            ("banana", 5.99),
            ("apple", 8.99),
            ("orange", 2.99),
            ("gepa_bio_und_fair_fencheltee", 20.00),
        ]
        .into_iter()
        .map(|(label, price)| (label.to_string(), price))
        .collect();
        Self { per_kg }
    }
}

/// Presentation form of a price, two decimals: `R$ 1.80`.
pub fn format_price(currency: &str, price: f64) -> String {
    format!("{} {:.2}", currency, price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_label_is_weight_times_rate() {
        let table = PriceTable::default();
        assert!((table.price("apple", 0.2) - 1.798).abs() < 1e-9);
        assert_eq!(format_price("R$", table.price("apple", 0.2)), "R$ 1.80");
    }

    #[test]
    fn unknown_label_is_free_regardless_of_weight() {
        let table = PriceTable::default();
        assert_eq!(table.price("durian", 3.5), 0.0);
        assert!(!table.contains("durian"));
    }

    #[test]
    fn negative_price_fails_validation() {
        let table = PriceTable::new([("apple".to_string(), -1.0)].into_iter().collect());
        assert!(table.validate().is_err());
        assert!(PriceTable::default().validate().is_ok());
    }
}
