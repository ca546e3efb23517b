use bazaar_core::{
    models::{
        AuctionConfig, Credits, CurrencyConfig, Demand, Device, DeviceDto, MarketConfig,
        PriorityClass, PricingConfig, ResourceType, SettlementPolicy, Tenant, TenantId,
    },
    ports::RoundContext,
};
use bazaar_market::{DeviceRegistry, Scheduler};
use rstest::*;
use rstest_reuse::{self, *};

use all_policies::all_policies;

const ALPHA: f64 = 0.5;
const TARGET: f64 = 0.8;
const WINDOW: u64 = 5;

// A greedy tenant outbids everybody for the whole pool, every round. Its income per
// credit interval (50, less decay) cannot buy the pool for five rounds even at the
// floor price, so it runs short in every interval after the opening endowment is
// spent, and a tenant bidding exactly the posted price gets served.
#[apply(all_policies)]
#[rstest]
fn modest_bidder_is_not_starved(settlement: SettlementPolicy) {
    let registry = DeviceRegistry::new([Device::new(DeviceDto {
        id: "node".into(),
        category: "edge".to_owned(),
        capacity: std::iter::once(("cpu".into(), 10.0)).collect(),
        base_price: std::iter::once(("cpu".into(), 1.0)).collect(),
        power_draw: 50.0,
    })
    .unwrap()])
    .unwrap();

    let config = MarketConfig {
        rounds: 100,
        pricing: PricingConfig {
            alpha: ALPHA,
            target_utilization: TARGET,
            min_price: 1.0,
            max_price: 10.0,
        },
        currency: CurrencyConfig {
            initial_allocation: Credits::from_whole(100),
            periodic_allocation: Credits::from_whole(50),
            credit_interval: WINDOW,
            decay_factor: 0.9,
            decay_interval: WINDOW,
        },
        auction: AuctionConfig {
            settlement,
            ..Default::default()
        },
    };

    let mut scheduler = Scheduler::new(config, registry).unwrap();
    scheduler
        .add_tenant(
            Tenant::new("greedy", PriorityClass::High),
            Box::new(|_: &Tenant, _: &RoundContext<'_>| vec![Demand::new("cpu", 10.0, 100.0)]),
        )
        .unwrap();
    scheduler
        .add_tenant(
            Tenant::new("modest", PriorityClass::Low),
            Box::new(|_: &Tenant, ctx: &RoundContext<'_>| {
                let price = ctx.price(&"cpu".into()).unwrap_or(1.0);
                vec![Demand::new("cpu", 0.5, price)]
            }),
        )
        .unwrap();

    let modest = TenantId::from("modest");
    let cpu = ResourceType::from("cpu");
    let mut served = vec![false; 100 / WINDOW as usize];
    while let Some(summary) = scheduler.step().unwrap() {
        if summary.allocation.granted(&modest, &cpu) > 0.0 {
            served[(summary.round / WINDOW) as usize] = true;
        }
    }

    // the first interval runs on the opening endowment
    for (window, &ok) in served.iter().enumerate().skip(1) {
        assert!(ok, "modest tenant starved in window {window}");
    }
}
