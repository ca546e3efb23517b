use bazaar_core::models::{
    Allocation, AuctionConfig, Bid, ClearingOutcome, Credits, MalformedBid, MalformedBidError,
    Map, Prices, PriorityClass, Quantities, Rejection, RejectionReason, SettlementPolicy,
    TenantId, TieBreak, Trade,
};
use std::cmp::Ordering;
use tracing::{Level, event};

/// The auction engine.
///
/// Clearing is greedy and fully deterministic. For each resource type, in the order
/// the capacities are listed:
///
/// 1. bids offering less than the posted price are rejected;
/// 2. the rest are ranked by offered price (descending), then priority class
///    (descending, unless configured otherwise), then tenant id (ascending), with
///    submission order as the final tiebreak;
/// 3. capacity is handed out greedily, each fill clipped to what the tenant's
///    remaining balance affords at the unit clearing price, and charged its
///    notional value rounded up to the next micro-credit.
///
/// A tenant's balance is shared across all of its bids in the round, so the total
/// cost of its trades never exceeds its pre-round balance.
#[derive(Clone, Debug, Default)]
pub struct Auction {
    settlement: SettlementPolicy,
    tie_break: TieBreak,
}

// Running totals of one tenant's fills of one resource type
#[derive(Default)]
struct Fill {
    quantity: f64,
    notional: f64,
    cost: Credits,
}

impl Auction {
    /// Create an auction engine from its configuration
    pub fn new(config: &AuctionConfig) -> Self {
        Self {
            settlement: config.settlement,
            tie_break: config.tie_break,
        }
    }

    /// The settlement policy in effect
    pub fn settlement(&self) -> SettlementPolicy {
        self.settlement
    }

    /// Clear one round of bids.
    ///
    /// `balances` is a snapshot of the ledger and is never modified; tenants missing
    /// from it are unknown and their bids malformed. Tenants missing from
    /// `priorities` are treated as `PriorityClass::Medium`. A resource type must have
    /// both a capacity and a posted price to be biddable.
    pub fn clear(
        &self,
        round: u64,
        bids: &[Bid],
        prices: &Prices,
        capacities: &Quantities,
        balances: &Map<TenantId, Credits>,
        priorities: &Map<TenantId, PriorityClass>,
    ) -> ClearingOutcome {
        let mut outcome = ClearingOutcome::default();

        // Intake: anything that fails validation is set aside and the round continues
        let mut valid = Vec::with_capacity(bids.len());
        for bid in bids.iter() {
            match self.validate(bid, prices, capacities, balances) {
                Ok(()) => valid.push(bid),
                Err(error) => {
                    event!(
                        Level::WARN,
                        round,
                        tenant = %bid.tenant,
                        resource = %bid.resource,
                        %error,
                        "malformed bid"
                    );
                    outcome.malformed.push(MalformedBid {
                        bid: bid.clone(),
                        error,
                    });
                }
            }
        }

        let mut remaining_balance = balances.clone();

        for (resource, &capacity) in capacities.iter() {
            let market = prices.value_or_zero(resource);

            let mut eligible = Vec::new();
            for &bid in valid.iter().filter(|bid| &bid.resource == resource) {
                if bid.price < market {
                    outcome.rejections.push(Rejection {
                        bid: bid.clone(),
                        granted: 0.0,
                        reason: RejectionReason::BelowMarket,
                    });
                } else {
                    eligible.push(bid);
                }
            }

            // `sort_by` is stable, so submission order breaks any remaining ties
            eligible.sort_by(|a, b| self.rank(a, b, priorities));

            let mut available = capacity.max(0.0);
            let mut requested = 0.0;
            let mut fills = Map::<TenantId, Fill>::default();

            for bid in eligible {
                requested += bid.quantity;

                let unit = match self.settlement {
                    SettlementPolicy::Uniform => market,
                    SettlementPolicy::PayAsBid => bid.price,
                };
                let balance = remaining_balance
                    .get(&bid.tenant)
                    .copied()
                    .unwrap_or_default();
                let affordable = if unit > 0.0 {
                    balance.as_f64() / unit
                } else {
                    f64::INFINITY
                };

                let mut granted = bid.quantity.min(affordable).min(available).max(0.0);

                if granted > 0.0 {
                    // Charges round up. Where that would overdraw, the fill is
                    // sized to exactly the remaining balance instead.
                    let mut cost = Credits::from_f64_ceil(granted * unit);
                    if cost > balance {
                        cost = balance;
                        granted = balance.as_f64() / unit;
                    }
                    available = (available - granted).max(0.0);
                    if let Some(entry) = remaining_balance.get_mut(&bid.tenant) {
                        *entry = entry.saturating_sub(cost);
                    }

                    let fill = fills.entry(bid.tenant.clone()).or_default();
                    fill.quantity += granted;
                    fill.notional += granted * unit;
                    fill.cost += cost;
                }

                if granted < bid.quantity {
                    let reason = if affordable < bid.quantity && affordable < available + granted
                    {
                        RejectionReason::InsufficientFunds
                    } else {
                        RejectionReason::CapacityExhausted
                    };
                    outcome.rejections.push(Rejection {
                        bid: bid.clone(),
                        granted,
                        reason,
                    });
                }
            }

            let mut granted_total = 0.0;
            for (tenant, fill) in fills {
                granted_total += fill.quantity;
                let price = match self.settlement {
                    SettlementPolicy::Uniform => market,
                    SettlementPolicy::PayAsBid => fill.notional / fill.quantity,
                };
                outcome.trades.push(Trade {
                    round,
                    tenant,
                    resource: resource.clone(),
                    quantity: fill.quantity,
                    price,
                    cost: fill.cost,
                });
            }

            let utilization = if capacity > 0.0 {
                (granted_total / capacity).clamp(0.0, 1.0)
            } else {
                0.0
            };
            outcome.utilization.insert(resource.clone(), utilization);
            outcome
                .unmet_demand
                .insert(resource.clone(), (requested - granted_total).max(0.0));

            event!(
                Level::DEBUG,
                round,
                %resource,
                price = market,
                capacity,
                requested,
                granted = granted_total,
                "resource cleared"
            );
        }

        outcome.allocation = Allocation::from_trades(&outcome.trades);
        outcome
    }

    fn validate(
        &self,
        bid: &Bid,
        prices: &Prices,
        capacities: &Quantities,
        balances: &Map<TenantId, Credits>,
    ) -> Result<(), MalformedBidError> {
        if !balances.contains_key(&bid.tenant) {
            return Err(MalformedBidError::UnknownTenant(bid.tenant.clone()));
        }
        if !capacities.contains_key(&bid.resource) || !prices.contains_key(&bid.resource) {
            return Err(MalformedBidError::UnknownResource(bid.resource.clone()));
        }
        if !(bid.quantity.is_finite() && bid.quantity > 0.0) {
            return Err(MalformedBidError::InvalidQuantity(bid.quantity));
        }
        if !bid.price.is_finite() {
            return Err(MalformedBidError::InvalidPrice(bid.price));
        }
        Ok(())
    }

    fn rank(&self, a: &Bid, b: &Bid, priorities: &Map<TenantId, PriorityClass>) -> Ordering {
        let priority = |bid: &Bid| priorities.get(&bid.tenant).copied().unwrap_or_default();

        let by_price = b.price.total_cmp(&a.price);
        let by_priority = match self.tie_break {
            TieBreak::PriorityThenTenant => priority(b).cmp(&priority(a)),
            TieBreak::TenantOnly => Ordering::Equal,
        };
        by_price
            .then(by_priority)
            .then_with(|| a.tenant.cmp(&b.tenant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bazaar_core::models::ResourceType;
    use rstest::*;

    fn trades_for<'a>(outcome: &'a ClearingOutcome, resource: &ResourceType) -> Vec<&'a Trade> {
        outcome
            .trades
            .iter()
            .filter(|trade| &trade.resource == resource)
            .collect()
    }

    struct Market {
        prices: Prices,
        capacities: Quantities,
        balances: Map<TenantId, Credits>,
        priorities: Map<TenantId, PriorityClass>,
    }

    impl Market {
        fn clear(&self, auction: &Auction, bids: &[Bid]) -> ClearingOutcome {
            auction.clear(
                0,
                bids,
                &self.prices,
                &self.capacities,
                &self.balances,
                &self.priorities,
            )
        }
    }

    #[fixture]
    fn market() -> Market {
        Market {
            prices: [("cpu".into(), 7.0), ("memory".into(), 1.0)]
                .into_iter()
                .collect(),
            capacities: [("cpu".into(), 7.0), ("memory".into(), 100.0)]
                .into_iter()
                .collect(),
            balances: [
                ("a".into(), Credits::from_whole(1000)),
                ("b".into(), Credits::from_whole(1000)),
                ("c".into(), Credits::from_whole(1000)),
            ]
            .into_iter()
            .collect(),
            priorities: [
                ("a".into(), PriorityClass::Medium),
                ("b".into(), PriorityClass::Medium),
                ("c".into(), PriorityClass::High),
            ]
            .into_iter()
            .collect(),
        }
    }

    fn bid(tenant: &str, resource: &str, quantity: f64, price: f64) -> Bid {
        Bid {
            tenant: tenant.into(),
            resource: resource.into(),
            quantity,
            price,
            round: 0,
        }
    }

    fn auction(settlement: SettlementPolicy, tie_break: TieBreak) -> Auction {
        Auction::new(&AuctionConfig {
            settlement,
            tie_break,
            ..Default::default()
        })
    }

    #[rstest]
    fn greedy_by_price(market: Market) {
        let auction = Auction::default();
        let outcome = market.clear(
            &auction,
            &[bid("b", "cpu", 5.0, 8.0), bid("a", "cpu", 5.0, 10.0)],
        );

        let cpu = ResourceType::from("cpu");
        assert_eq!(outcome.allocation.granted(&"a".into(), &cpu), 5.0);
        assert_eq!(outcome.allocation.granted(&"b".into(), &cpu), 2.0);

        let trades = trades_for(&outcome, &cpu);
        assert_eq!(trades.len(), 2);
        assert!(trades.iter().all(|trade| trade.price == 7.0));
        assert_eq!(trades[0].cost, Credits::from_whole(35));
        assert_eq!(trades[1].cost, Credits::from_whole(14));

        assert_eq!(outcome.utilization.value_or_zero("cpu"), 1.0);
        assert_eq!(outcome.unmet_demand.value_or_zero("cpu"), 3.0);
        assert_eq!(outcome.rejections.len(), 1);
        assert_eq!(
            outcome.rejections[0].reason,
            RejectionReason::CapacityExhausted
        );
    }

    #[rstest]
    fn pay_as_bid_charges_offer(market: Market) {
        let auction = auction(SettlementPolicy::PayAsBid, TieBreak::default());
        let outcome = market.clear(
            &auction,
            &[bid("a", "cpu", 5.0, 10.0), bid("b", "cpu", 5.0, 8.0)],
        );

        assert_eq!(outcome.trades[0].price, 10.0);
        assert_eq!(outcome.trades[0].cost, Credits::from_whole(50));
        assert_eq!(outcome.trades[1].price, 8.0);
        assert_eq!(outcome.trades[1].cost, Credits::from_whole(16));
    }

    #[rstest]
    fn priority_breaks_ties(market: Market) {
        let bids = [bid("a", "cpu", 7.0, 9.0), bid("c", "cpu", 7.0, 9.0)];
        let cpu = ResourceType::from("cpu");

        let outcome = market.clear(&Auction::default(), &bids);
        assert_eq!(outcome.allocation.granted(&"c".into(), &cpu), 7.0);
        assert_eq!(outcome.allocation.granted(&"a".into(), &cpu), 0.0);

        let tenant_only = auction(SettlementPolicy::Uniform, TieBreak::TenantOnly);
        let outcome = market.clear(&tenant_only, &bids);
        assert_eq!(outcome.allocation.granted(&"a".into(), &cpu), 7.0);
        assert_eq!(outcome.allocation.granted(&"c".into(), &cpu), 0.0);
    }

    #[rstest]
    fn below_market_is_rejected(market: Market) {
        let outcome = market.clear(&Auction::default(), &[bid("a", "cpu", 1.0, 6.99)]);
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.utilization.value_or_zero("cpu"), 0.0);
        assert_eq!(outcome.unmet_demand.value_or_zero("cpu"), 0.0);
        assert_eq!(outcome.rejections[0].reason, RejectionReason::BelowMarket);
    }

    #[rstest]
    fn clips_to_balance(mut market: Market) {
        market.balances.insert("a".into(), Credits::from_whole(21));
        let outcome = market.clear(
            &Auction::default(),
            &[bid("a", "cpu", 5.0, 10.0), bid("a", "memory", 10.0, 2.0)],
        );

        // 21 credits buy 3 cpu at 7, leaving nothing for memory
        assert_relative_eq!(
            outcome.allocation.granted(&"a".into(), &"cpu".into()),
            3.0
        );
        assert_eq!(outcome.allocation.granted(&"a".into(), &"memory".into()), 0.0);
        let spent = outcome.spend().get("a").copied().unwrap_or_default();
        assert!(spent <= Credits::from_whole(21));
        assert!(
            outcome
                .rejections
                .iter()
                .all(|r| r.reason == RejectionReason::InsufficientFunds)
        );
    }

    #[rstest]
    fn dust_fills_are_charged(mut market: Market) {
        market.balances.insert("a".into(), Credits::from_micros(1));
        let bids = vec![bid("a", "memory", 9e-7, 1.0); 1000];
        let outcome = market.clear(&Auction::default(), &bids);

        // the first fill takes the only micro-credit, the rest go unfilled
        let granted = outcome.allocation.granted(&"a".into(), &"memory".into());
        let spent = outcome.spend().get("a").copied().unwrap_or_default();
        assert_relative_eq!(granted, 9e-7);
        assert_eq!(spent, Credits::from_micros(1));
        assert!(granted * 1.0 * Credits::SCALE as f64 <= spent.micros() as f64);
    }

    #[rstest]
    #[case(SettlementPolicy::Uniform)]
    #[case(SettlementPolicy::PayAsBid)]
    fn charges_cover_quantity_times_price(market: Market, #[case] settlement: SettlementPolicy) {
        let auction = auction(settlement, TieBreak::default());
        let bids = [
            bid("a", "memory", 3.333_333_3, 1.1),
            bid("b", "memory", 0.123_456_7, 2.5),
            bid("a", "cpu", 0.7, 7.3),
            bid("b", "memory", 10.0 / 3.0, 1.7),
        ];
        let outcome = market.clear(&auction, &bids);
        assert_eq!(outcome.trades.len(), 3);

        for (tenant, spent) in outcome.spend() {
            let trades = outcome
                .trades
                .iter()
                .filter(|trade| trade.tenant == tenant)
                .collect::<Vec<_>>();
            let notional = trades
                .iter()
                .map(|trade| trade.quantity * trade.price * Credits::SCALE as f64)
                .sum::<f64>();
            let fills = bids.iter().filter(|bid| bid.tenant == tenant).count() as f64;

            // every fill rounds up by less than one micro-credit
            let spent = spent.micros() as f64;
            assert!(spent >= notional - 1e-6, "{tenant}: {spent} < {notional}");
            assert!(spent < notional + fills, "{tenant}: {spent} >= {notional} + {fills}");
        }
    }

    #[rstest]
    fn malformed_bids_do_not_abort(market: Market) {
        let outcome = market.clear(
            &Auction::default(),
            &[
                bid("a", "gpu", 1.0, 10.0),
                bid("z", "cpu", 1.0, 10.0),
                bid("a", "cpu", -1.0, 10.0),
                bid("a", "cpu", 1.0, f64::NAN),
                bid("b", "cpu", 2.0, 10.0),
            ],
        );

        let errors = outcome
            .malformed
            .iter()
            .map(|m| m.error.clone())
            .collect::<Vec<_>>();
        assert!(matches!(errors[0], MalformedBidError::UnknownResource(_)));
        assert!(matches!(errors[1], MalformedBidError::UnknownTenant(_)));
        assert!(matches!(errors[2], MalformedBidError::InvalidQuantity(_)));
        assert!(matches!(errors[3], MalformedBidError::InvalidPrice(_)));
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].quantity, 2.0);
    }

    #[rstest]
    fn merges_trades_per_tenant(market: Market) {
        let auction = auction(SettlementPolicy::PayAsBid, TieBreak::default());
        let outcome = market.clear(
            &auction,
            &[bid("a", "memory", 10.0, 2.0), bid("a", "memory", 30.0, 4.0)],
        );

        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.quantity, 40.0);
        assert_relative_eq!(trade.price, 140.0 / 40.0);
        assert_eq!(trade.cost, Credits::from_whole(140));
    }

    #[rstest]
    fn no_bids_no_allocation(market: Market) {
        let outcome = market.clear(&Auction::default(), &[]);
        assert!(outcome.allocation.is_empty());
        assert!(outcome.trades.is_empty());
        assert!(outcome.utilization.values().all(|&u| u == 0.0));
    }
}
