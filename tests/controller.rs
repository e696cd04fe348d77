#![allow(non_snake_case)]
use alloy::primitives::Address;
use futures::{
    FutureExt,
    StreamExt,
};
use lottery_ballot::{
    controller::{
        Action,
        CHECK_WINNER_FAILED,
        CONTRACT_DESTROYED,
        DEFAULT_STAKE,
        Lifecycle,
        NO_PRIZES,
    },
    ledger::{
        BidPlaced,
        ItemId,
        Ledger,
        LotteryContract,
        Phase,
        TxParams,
    },
    notifications::Severity,
    simulated::{
        Call,
        DEFAULT_STARTING_BALANCE,
    },
    test_helpers::TestContext,
};
use proptest::prelude::*;

fn item(index: usize) -> ItemId {
    ItemId::new(index).unwrap()
}

#[tokio::test]
async fn initialize__loads_accounts_roles_counts_and_phase() {
    // given
    let mut ctx = TestContext::new();
    let bob = ctx.bob();
    ctx.chain
        .bid(item(2), TxParams::from(bob).with_value(DEFAULT_STAKE))
        .await
        .unwrap();

    // when
    let subscriptions = ctx.controller.initialize().await;

    // then
    assert!(subscriptions.is_some());
    let session = ctx.controller.session();
    assert_eq!(ctx.controller.lifecycle(), Lifecycle::Mounted);
    assert_eq!(session.current_account, Some(ctx.alice()));
    assert_eq!(session.known_accounts.len(), 4);
    assert_eq!(session.current_account_balance, Some(DEFAULT_STARTING_BALANCE));
    assert_eq!(session.contract_balance, Some(DEFAULT_STAKE));
    assert_eq!(session.owner, Some(ctx.president()));
    assert_eq!(session.privileged_account, Some(ctx.deployer()));
    assert_eq!(session.bid_counts, [0, 0, 1]);
    assert_eq!(session.phase, Phase::Open);
    assert!(session.status.is_empty());
}

#[tokio::test]
async fn initialize__is_a_no_op_the_second_time() {
    let (mut ctx, _subscriptions) = TestContext::mounted().await;

    let again = ctx.controller.initialize().await;

    assert!(again.is_none());
    assert_eq!(ctx.controller.lifecycle(), Lifecycle::Mounted);
}

#[tokio::test]
async fn initialize__keeps_loading_when_one_group_fails() {
    // given
    let mut ctx = TestContext::new();
    ctx.chain.set_failing(Call::Owner, true).unwrap();

    // when
    ctx.controller.initialize().await.unwrap();

    // then
    let session = ctx.controller.session();
    assert_eq!(session.owner, None);
    assert_eq!(session.current_account, Some(ctx.alice()));
    assert_eq!(session.phase, Phase::Open);
    assert_eq!(session.status, "Failed to load owner.");
}

#[tokio::test]
async fn initialize__leaves_phase_unknown_when_it_cannot_be_read() {
    let mut ctx = TestContext::new();
    ctx.chain.set_failing(Call::Phase, true).unwrap();

    ctx.controller.initialize().await.unwrap();

    assert_eq!(ctx.controller.session().phase, Phase::Unknown);
    assert_eq!(ctx.controller.session().status, "Failed to load lottery State.");
    // Unknown is not closed, so bidding stays available.
    assert!(ctx.controller.availability().bid);
}

#[tokio::test]
async fn initialize__survives_a_failed_event_subscription() {
    // given
    let mut ctx = TestContext::new();
    ctx.chain.set_failing(Call::SubscribeBids, true).unwrap();

    // when
    let mut subscriptions = ctx.controller.initialize().await.unwrap();

    // then
    assert_eq!(ctx.controller.session().phase, Phase::Open);
    assert!(subscriptions.bids.next().now_or_never().is_none());
}

#[tokio::test]
async fn place_bid__submits_one_stake_bid_and_waits_for_the_event_to_count() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let alice = ctx.alice();

    // when
    ctx.controller.place_bid(item(1)).await;

    // then
    let submitted = ctx.chain.submitted().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].call, Call::Bid);
    assert_eq!(submitted[0].item, Some(item(1)));
    assert_eq!(
        submitted[0].tx,
        TxParams::from(alice).with_value(DEFAULT_STAKE)
    );
    assert_eq!(ctx.controller.session().bid_counts, [0, 0, 0]);
    assert_eq!(ctx.controller.session().status, "You have placed your bid!");

    assert_eq!(ctx.deliver_events(&mut subscriptions).await, 1);
    let session = ctx.controller.session();
    assert_eq!(session.bid_counts, [0, 1, 0]);
    assert_eq!(
        session.current_account_balance,
        Some(DEFAULT_STARTING_BALANCE - DEFAULT_STAKE)
    );
    assert_eq!(session.contract_balance, Some(DEFAULT_STAKE));
}

#[tokio::test]
async fn place_bid__failure_adds_exactly_one_error_and_changes_nothing() {
    // given
    let (mut ctx, _subscriptions) = TestContext::mounted().await;
    ctx.chain.set_failing(Call::Bid, true).unwrap();
    let before = ctx.controller.session().clone();

    // when
    ctx.controller.place_bid(item(0)).await;

    // then
    assert_eq!(ctx.controller.notifications().len(), 1);
    assert_eq!(ctx.notification_texts(Severity::Error).len(), 1);
    let after = ctx.controller.session();
    assert_eq!(after.bid_counts, before.bid_counts);
    assert_eq!(after.current_account_balance, before.current_account_balance);
    assert_eq!(after.status, "Bid on Tesla Model S failed.");
}

#[tokio::test]
async fn on_bid_placed__counts_every_event_and_notifies() {
    let (mut ctx, _subscriptions) = TestContext::mounted().await;
    let bob = ctx.bob();

    for _ in 0..4 {
        ctx.controller
            .on_bid_placed(BidPlaced {
                item_id: 2,
                bidder: bob,
            })
            .await;
    }

    assert_eq!(ctx.controller.session().bid_counts, [0, 0, 4]);
    assert_eq!(ctx.notification_texts(Severity::Success).len(), 4);
}

#[tokio::test]
async fn on_bid_placed__ignores_items_outside_the_catalogue() {
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let bob = ctx.bob();

    ctx.chain.emit_bid_placed(BidPlaced {
        item_id: 7,
        bidder: bob,
    });
    ctx.deliver_events(&mut subscriptions).await;

    assert_eq!(ctx.controller.session().bid_counts, [0, 0, 0]);
    assert!(ctx.controller.notifications().is_empty());
}

proptest! {
    #[test]
    fn on_bid_placed__count_per_item_equals_events_for_it(
        items in prop::collection::vec(0u64..3, 0..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async {
            let (mut ctx, _subscriptions) = TestContext::mounted().await;
            let bob = ctx.bob();
            for item_id in &items {
                ctx.controller
                    .on_bid_placed(BidPlaced { item_id: *item_id, bidder: bob })
                    .await;
            }
            for index in 0..3 {
                let expected = items.iter().filter(|i| **i == index as u64).count() as u64;
                assert_eq!(ctx.controller.session().bid_counts[index], expected);
            }
        });
    }
}

#[tokio::test]
async fn on_phase_changed__replaces_the_phase_from_contract_events() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let president = ctx.president();

    // when
    ctx.chain
        .reveal_winners(TxParams::from(president))
        .await
        .unwrap();
    ctx.deliver_events(&mut subscriptions).await;

    // then
    assert_eq!(ctx.controller.session().phase, Phase::Closed);
}

#[tokio::test]
async fn availability__owner_in_closed_phase_can_only_declare() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let president = ctx.president();
    ctx.chain
        .reveal_winners(TxParams::from(president))
        .await
        .unwrap();
    ctx.deliver_events(&mut subscriptions).await;

    // when
    ctx.switch_to(&mut subscriptions, president).await;

    // then
    let availability = ctx.controller.availability();
    assert!(!availability.bid);
    assert!(availability.declare_winners);
    assert!(!availability.check_winner);
}

#[tokio::test]
async fn reveal_winners__announces_the_pick() {
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let president = ctx.president();
    ctx.switch_to(&mut subscriptions, president).await;

    ctx.controller.reveal_winners().await;

    assert_eq!(ctx.controller.session().status, "A winner has been picked!");
    assert_eq!(ctx.chain.phase().await.unwrap(), Phase::Closed);
}

#[tokio::test]
async fn reset__zeroes_every_count() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let president = ctx.president();
    ctx.controller.place_bid(item(0)).await;
    ctx.controller.place_bid(item(2)).await;
    ctx.deliver_events(&mut subscriptions).await;
    assert_eq!(ctx.controller.session().bid_counts, [1, 0, 1]);
    ctx.switch_to(&mut subscriptions, president).await;

    // when
    ctx.controller.reset().await;

    // then
    assert_eq!(ctx.controller.session().bid_counts, [0, 0, 0]);
    assert_eq!(ctx.controller.session().status, "Contract has been reset.");
    assert_eq!(ctx.chain.bidder_count(item(0)).await.unwrap(), 0);
}

#[tokio::test]
async fn withdraw__refreshes_both_balances() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let (alice, president) = (ctx.alice(), ctx.president());
    ctx.chain
        .bid(item(1), TxParams::from(alice).with_value(DEFAULT_STAKE))
        .await
        .unwrap();
    ctx.switch_to(&mut subscriptions, president).await;

    // when
    ctx.controller.withdraw().await;

    // then
    let session = ctx.controller.session();
    assert_eq!(session.contract_balance, Some(0));
    assert_eq!(
        session.current_account_balance,
        Some(DEFAULT_STARTING_BALANCE + DEFAULT_STAKE)
    );
    assert_eq!(
        ctx.notification_texts(Severity::Success),
        vec!["Funds have been withdrawn!".to_string()]
    );
}

#[tokio::test]
async fn check_winner__without_prizes_adds_one_error() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let (alice, bob, president) = (ctx.alice(), ctx.bob(), ctx.president());
    ctx.chain
        .bid(item(0), TxParams::from(alice).with_value(DEFAULT_STAKE))
        .await
        .unwrap();
    ctx.chain
        .reveal_winners(TxParams::from(president))
        .await
        .unwrap();
    ctx.controller.on_phase_changed(Phase::Closed);
    ctx.switch_to(&mut subscriptions, bob).await;

    // when
    ctx.controller.check_winner().await;

    // then
    assert_eq!(ctx.notification_texts(Severity::Error), vec![NO_PRIZES.to_string()]);
    assert!(ctx.notification_texts(Severity::Success).is_empty());
    assert!(ctx.controller.session().won_items.is_empty());
}

#[tokio::test]
async fn check_winner__adds_one_success_per_won_item() {
    // given
    let (mut ctx, _subscriptions) = TestContext::mounted().await;
    let (alice, president) = (ctx.alice(), ctx.president());
    for won in ItemId::ALL {
        ctx.chain
            .bid(won, TxParams::from(alice).with_value(DEFAULT_STAKE))
            .await
            .unwrap();
    }
    ctx.chain
        .reveal_winners(TxParams::from(president))
        .await
        .unwrap();
    ctx.controller.on_phase_changed(Phase::Closed);

    // when
    ctx.controller.check_winner().await;

    // then
    assert_eq!(ctx.notification_texts(Severity::Success).len(), 3);
    assert!(ctx.notification_texts(Severity::Error).is_empty());
    assert_eq!(ctx.controller.session().won_items, ItemId::ALL.to_vec());
    assert_eq!(
        ctx.controller.session().status,
        "Successfully got won items."
    );
}

#[tokio::test]
async fn check_winner__query_failure_adds_one_error() {
    let (mut ctx, _subscriptions) = TestContext::mounted().await;
    ctx.chain.set_failing(Call::CheckWinner, true).unwrap();

    ctx.controller.check_winner().await;

    assert_eq!(
        ctx.notification_texts(Severity::Error),
        vec![CHECK_WINNER_FAILED.to_string()]
    );
    assert_eq!(ctx.controller.session().status, CHECK_WINNER_FAILED);
}

#[tokio::test]
async fn change_owner__keeps_the_optimistic_owner_after_a_revert() {
    // given
    let (mut ctx, _subscriptions) = TestContext::mounted().await;
    let (bob, president) = (ctx.bob(), ctx.president());
    ctx.controller.set_owner_input(bob.to_string());

    // when
    // alice is not allowed to change the owner, so the contract reverts
    ctx.controller.change_owner().await;

    // then
    assert_eq!(ctx.controller.session().owner, Some(bob));
    assert_eq!(ctx.chain.owner().await.unwrap(), president);
    assert_eq!(ctx.notification_texts(Severity::Error).len(), 1);
    assert_eq!(ctx.controller.session().pending_owner_input, bob.to_string());
}

#[tokio::test]
async fn change_owner__clears_the_input_on_success() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let (bob, deployer) = (ctx.bob(), ctx.deployer());
    ctx.switch_to(&mut subscriptions, deployer).await;
    ctx.controller.set_owner_input(format!(" {bob} "));

    // when
    ctx.controller.change_owner().await;

    // then
    assert_eq!(ctx.controller.session().owner, Some(bob));
    assert!(ctx.controller.session().pending_owner_input.is_empty());
    assert_eq!(ctx.chain.owner().await.unwrap(), bob);
}

#[tokio::test]
async fn change_owner__rejects_malformed_addresses_without_calling_out() {
    let (mut ctx, _subscriptions) = TestContext::mounted().await;
    let president = ctx.president();
    ctx.controller.set_owner_input("not-an-address");

    ctx.controller.change_owner().await;

    assert!(ctx.chain.submitted().unwrap().is_empty());
    assert_eq!(ctx.controller.session().owner, Some(president));
    assert_eq!(ctx.notification_texts(Severity::Error).len(), 1);
}

#[tokio::test]
async fn destroy_contract__by_privileged_account_clears_the_owner() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let deployer = ctx.deployer();
    ctx.switch_to(&mut subscriptions, deployer).await;

    // when
    ctx.controller.destroy_contract().await;

    // then
    let entries = ctx.controller.notifications().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Error);
    assert_eq!(entries[0].text, CONTRACT_DESTROYED);
    assert_eq!(ctx.controller.session().owner, Some(Address::ZERO));
    let availability = ctx.controller.availability();
    assert!(!availability.bid);
    assert!(!availability.destroy);
    assert!(!availability.change_owner);
}

#[tokio::test]
async fn on_account_changed__privileged_account_becomes_owner_without_a_query() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let deployer = ctx.deployer();
    ctx.chain.set_failing(Call::Owner, true).unwrap();

    // when
    ctx.switch_to(&mut subscriptions, deployer).await;

    // then
    let session = ctx.controller.session();
    assert_eq!(session.current_account, Some(deployer));
    assert_eq!(session.owner, Some(deployer));
    assert!(session.status.is_empty());
}

#[tokio::test]
async fn on_account_changed__requeries_owner_and_balance() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let (alice, bob, president) = (ctx.alice(), ctx.bob(), ctx.president());
    ctx.chain
        .bid(item(0), TxParams::from(bob).with_value(DEFAULT_STAKE))
        .await
        .unwrap();

    // when
    ctx.switch_to(&mut subscriptions, bob).await;

    // then
    let session = ctx.controller.session();
    assert_eq!(session.current_account, Some(bob));
    assert_eq!(session.owner, Some(president));
    assert_eq!(
        session.current_account_balance,
        Some(DEFAULT_STARTING_BALANCE - DEFAULT_STAKE)
    );
    assert_ne!(session.current_account, Some(alice));
}

#[tokio::test]
async fn switch_to_next_account__goes_through_the_wallet_stream() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let bob = ctx.bob();

    // when
    ctx.controller.switch_to_next_account();

    // then
    let changed = subscriptions.accounts.next().await.unwrap();
    assert_eq!(changed, bob);
    // Nothing changes until the stream event is handled.
    assert_eq!(ctx.controller.session().current_account, Some(ctx.alice()));
}

#[tokio::test]
async fn dispatch__refuses_actions_the_session_does_not_offer() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let president = ctx.president();
    ctx.switch_to(&mut subscriptions, president).await;

    // when
    let ran = ctx.controller.dispatch(Action::Bid(item(0))).await;

    // then
    assert!(!ran);
    assert!(ctx.chain.submitted().unwrap().is_empty());
    assert!(ctx.controller.session().status.contains("not available"));
}

#[tokio::test]
async fn dispatch__runs_offered_actions() {
    let (mut ctx, _subscriptions) = TestContext::mounted().await;

    let ran = ctx.controller.dispatch(Action::Bid(item(2))).await;

    assert!(ran);
    assert_eq!(ctx.chain.submitted().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn notifications__fade_then_expire_through_the_timer_channel() {
    // given
    let (mut ctx, _subscriptions) = TestContext::mounted().await;
    ctx.controller.place_bid(item(0)).await;
    assert_eq!(ctx.controller.notifications().len(), 1);

    // when
    let fade = ctx.timers.next().await.unwrap();
    ctx.controller.handle_timer(fade);
    assert!(ctx.controller.notifications().entries()[0].faded);
    let expire = ctx.timers.next().await.unwrap();
    ctx.controller.handle_timer(expire);

    // then
    assert!(ctx.controller.notifications().is_empty());
}

#[tokio::test]
async fn dismiss_oldest_notification__removes_in_insertion_order() {
    let (mut ctx, _subscriptions) = TestContext::mounted().await;
    ctx.controller.place_bid(item(0)).await;
    ctx.controller.check_winner().await;

    assert!(ctx.controller.dismiss_oldest_notification());

    let entries = ctx.controller.notifications().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Error);
}

#[tokio::test]
async fn teardown__clears_notifications_and_blocks_remounting() {
    // given
    let (mut ctx, _subscriptions) = TestContext::mounted().await;
    ctx.controller.place_bid(item(0)).await;

    // when
    let first = ctx.controller.teardown();
    let second = ctx.controller.teardown();

    // then
    assert!(first);
    assert!(!second);
    assert!(ctx.controller.notifications().is_empty());
    assert_eq!(ctx.controller.lifecycle(), Lifecycle::TornDown);
    assert!(ctx.controller.initialize().await.is_none());
}

#[tokio::test]
async fn ledger__balance_of_the_contract_tracks_bids() {
    let ctx = TestContext::new();
    let alice = ctx.alice();

    ctx.chain
        .bid(item(0), TxParams::from(alice).with_value(DEFAULT_STAKE))
        .await
        .unwrap();

    assert_eq!(
        ctx.chain.get_balance(ctx.chain.address()).await.unwrap(),
        DEFAULT_STAKE
    );
}

#[tokio::test]
async fn on_bid_placed__still_counts_and_notifies_when_balances_fail() {
    // given
    let (mut ctx, _subscriptions) = TestContext::mounted().await;
    let bob = ctx.bob();
    let before = ctx.controller.session().clone();
    ctx.chain.set_failing(Call::GetBalance, true).unwrap();

    // when
    ctx.controller
        .on_bid_placed(BidPlaced {
            item_id: 1,
            bidder: bob,
        })
        .await;

    // then
    let session = ctx.controller.session();
    assert_eq!(session.bid_counts, [0, 1, 0]);
    assert_eq!(session.current_account_balance, before.current_account_balance);
    assert_eq!(session.contract_balance, before.contract_balance);
    assert_eq!(ctx.notification_texts(Severity::Success).len(), 1);
}

#[tokio::test]
async fn on_account_changed__refreshes_balance_when_owner_query_fails() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let (bob, president) = (ctx.bob(), ctx.president());
    ctx.chain
        .bid(item(0), TxParams::from(bob).with_value(DEFAULT_STAKE))
        .await
        .unwrap();
    ctx.chain.set_failing(Call::Owner, true).unwrap();

    // when
    ctx.switch_to(&mut subscriptions, bob).await;

    // then
    let session = ctx.controller.session();
    assert_eq!(session.current_account, Some(bob));
    assert_eq!(session.owner, Some(president));
    assert_eq!(session.status, "Failed to load owner.");
    assert_eq!(
        session.current_account_balance,
        Some(DEFAULT_STARTING_BALANCE - DEFAULT_STAKE)
    );
}

#[tokio::test]
async fn initialize__reports_bid_counts_it_could_not_read() {
    // given
    let mut ctx = TestContext::new();
    let bob = ctx.bob();
    ctx.chain
        .bid(item(2), TxParams::from(bob).with_value(DEFAULT_STAKE))
        .await
        .unwrap();
    ctx.chain.set_failing(Call::BidderCount, true).unwrap();

    // when
    ctx.controller.initialize().await.unwrap();

    // then
    let session = ctx.controller.session();
    assert_eq!(session.bid_counts, [0, 0, 0]);
    assert_eq!(session.status, "Failed to load current bids.");
    assert_eq!(session.phase, Phase::Open);
    assert_eq!(session.owner, Some(ctx.president()));
}

#[tokio::test]
async fn reset__failure_keeps_counts_and_won_items() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let president = ctx.president();
    ctx.controller.place_bid(item(0)).await;
    ctx.chain
        .reveal_winners(TxParams::from(president))
        .await
        .unwrap();
    ctx.deliver_events(&mut subscriptions).await;
    ctx.controller.check_winner().await;
    assert_eq!(ctx.controller.session().won_items, vec![item(0)]);
    ctx.switch_to(&mut subscriptions, president).await;
    ctx.chain.set_failing(Call::ResetContract, true).unwrap();

    // when
    ctx.controller.reset().await;

    // then
    let session = ctx.controller.session();
    assert_eq!(session.bid_counts, [1, 0, 0]);
    assert_eq!(session.won_items, vec![item(0)]);
    assert_eq!(session.status, "Reset failed.");
    assert_eq!(ctx.notification_texts(Severity::Error).len(), 1);
}

#[tokio::test]
async fn withdraw__failure_leaves_both_balances() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let (alice, president) = (ctx.alice(), ctx.president());
    ctx.chain
        .bid(item(1), TxParams::from(alice).with_value(DEFAULT_STAKE))
        .await
        .unwrap();
    ctx.switch_to(&mut subscriptions, president).await;
    ctx.chain.set_failing(Call::Withdraw, true).unwrap();
    let before = ctx.controller.session().clone();

    // when
    ctx.controller.withdraw().await;

    // then
    let session = ctx.controller.session();
    assert_eq!(session.contract_balance, before.contract_balance);
    assert_eq!(session.current_account_balance, before.current_account_balance);
    assert_eq!(session.status, "Withdraw failed.");
    assert_eq!(ctx.chain.get_balance(ctx.chain.address()).await.unwrap(), DEFAULT_STAKE);
}

#[tokio::test]
async fn change_owner__rejects_the_zero_address_without_calling_out() {
    // given
    let (mut ctx, mut subscriptions) = TestContext::mounted().await;
    let (deployer, president) = (ctx.deployer(), ctx.president());
    ctx.switch_to(&mut subscriptions, deployer).await;
    ctx.controller.set_owner_input(Address::ZERO.to_string());

    // when
    ctx.controller.change_owner().await;

    // then
    assert!(ctx.chain.submitted().unwrap().is_empty());
    assert_eq!(ctx.controller.session().owner, Some(deployer));
    assert!(!ctx.controller.session().is_destroyed());
    assert!(ctx.controller.availability().change_owner);
    assert_eq!(ctx.notification_texts(Severity::Error).len(), 1);
    assert_eq!(ctx.chain.owner().await.unwrap(), president);
}

#[tokio::test]
async fn dispatch__refused_change_owner_discards_the_typed_address() {
    // given
    let (mut ctx, _subscriptions) = TestContext::mounted().await;
    let bob = ctx.bob();
    ctx.controller.set_owner_input(bob.to_string());

    // when
    let ran = ctx.controller.dispatch(Action::ChangeOwner).await;

    // then
    assert!(!ran);
    assert!(ctx.controller.session().pending_owner_input.is_empty());
    assert!(ctx.chain.submitted().unwrap().is_empty());
}
