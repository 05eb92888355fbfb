use agentdag::PriceTable;

#[test]
fn default_table_knows_the_haiku_model() {
    let table = PriceTable::default();
    let price = table.price_for("claude-3-haiku-20240307").unwrap();
    assert!((price.input_per_1k - 0.00025).abs() < 1e-12);
    assert!((price.output_per_1k - 0.00125).abs() < 1e-12);

    // 1000 input + 1000 output tokens cost exactly one unit of each rate.
    let cost = table.cost_usd("claude-3-haiku-20240307", 1000, 1000);
    assert!((cost - 0.0015).abs() < 1e-12);
}

#[test]
fn unknown_model_costs_nothing() {
    let table = PriceTable::empty();
    assert!(table.price_for("mystery-model").is_none());
    assert_eq!(table.cost_usd("mystery-model", 1_000_000, 1_000_000), 0.0);
}

#[test]
fn custom_registration_overrides_and_extends() {
    let table = PriceTable::default().with_model("claude-3-haiku-20240307", 1.0, 2.0);
    let cost = table.cost_usd("claude-3-haiku-20240307", 500, 500);
    assert!((cost - 1.5).abs() < 1e-12);

    let table = PriceTable::empty().with_model("stub-model", 0.04, 0.03);
    let cost = table.cost_usd("stub-model", 10, 20);
    assert!((cost - 0.001).abs() < 1e-12);
}
