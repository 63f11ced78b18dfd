//! Balancer V3 weighted pool: Vault reads through the tracker, then simulation on the result.

mod common;

use common::MockChain;
use ethers::abi::Token;
use ethers::types::{Address, U256};
use pool_sync_sdk::adapters::balancer_v3::{
    self, BalancerV3Config, BalancerV3Extra, BalancerV3StaticExtra, BalancerV3Tracker,
};
use pool_sync_sdk::contracts::{balancer_v3 as vault_abi, erc4626};
use pool_sync_sdk::{codec, registry, PoolEntity, PoolError, PoolToken, PoolTracker, SwapRequest, TrackParams};
use std::sync::Arc;

const ONE: u128 = 1_000_000_000_000_000_000;
const BLOCK: u64 = 21_000_000;

fn u(n: u128) -> U256 {
    U256::from(n)
}

fn vault() -> Address {
    vault_abi::VAULT.parse().unwrap()
}

fn pool() -> Address {
    Address::repeat_byte(0xb0)
}

fn uints(values: &[U256]) -> Token {
    Token::Array(values.iter().copied().map(Token::Uint).collect())
}

struct VaultState {
    registered: Vec<Address>,
    paused: bool,
    before_swap_hook: bool,
}

impl Default for VaultState {
    fn default() -> Self {
        Self {
            registered: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            paused: false,
            before_swap_hook: false,
        }
    }
}

/// 50/50 pool holding 1000 of each token, 0.3% swap fee, half of it to the protocol.
fn chain(state: VaultState) -> MockChain {
    let balances = [u(1000 * ONE), u(1000 * ONE)];
    let token_info = Token::Array(
        state
            .registered
            .iter()
            .map(|_| Token::Tuple(vec![Token::Uint(U256::zero()), Token::Address(Address::zero()), Token::Bool(false)]))
            .collect(),
    );
    let pool_config = Token::Tuple(vec![
        Token::Tuple(vec![Token::Bool(false); 4]),
        Token::Uint(u(3_000_000_000_000_000)),
        Token::Uint(u(500_000_000_000_000_000)),
        Token::Uint(U256::zero()),
        Token::Uint(U256::zero()),
        Token::Uint(U256::zero()),
        Token::Bool(true),
        Token::Bool(true),
        Token::Bool(state.paused),
        Token::Bool(false),
    ]);
    let mut hook_flags = vec![Token::Bool(false); 10];
    hook_flags[4] = Token::Bool(state.before_swap_hook);
    hook_flags.push(Token::Address(Address::zero()));

    MockChain::at_block(BLOCK)
        .returns(
            vault(),
            &vault_abi::GET_POOL_TOKEN_INFO,
            vec![
                Token::Array(state.registered.iter().copied().map(Token::Address).collect()),
                token_info,
                uints(&balances),
                uints(&balances),
            ],
        )
        .returns(vault(), &vault_abi::GET_CURRENT_LIVE_BALANCES, vec![uints(&balances)])
        .returns(
            vault(),
            &vault_abi::GET_POOL_TOKEN_RATES,
            vec![uints(&[U256::one(), U256::one()]), uints(&[u(ONE), u(ONE)])],
        )
        .returns(vault(), &vault_abi::GET_POOL_CONFIG, vec![pool_config])
        .returns(vault(), &vault_abi::GET_HOOKS_CONFIG, vec![Token::Tuple(hook_flags)])
        .returns(vault(), &vault_abi::IS_VAULT_PAUSED, vec![Token::Bool(false)])
        .returns(
            pool(),
            &vault_abi::GET_NORMALIZED_WEIGHTS,
            vec![uints(&[u(ONE / 2), u(ONE / 2)])],
        )
}

fn entity() -> PoolEntity {
    PoolEntity::new(
        format!("{:?}", pool()),
        "balancer-v3",
        balancer_v3::POOL_TYPE,
        vec![
            PoolToken::new(format!("{:?}", Address::repeat_byte(1)), 18),
            PoolToken::new(format!("{:?}", Address::repeat_byte(2)), 18),
        ],
        vec![U256::zero(), U256::zero()],
    )
    .unwrap()
}

fn tracker(chain: &Arc<MockChain>) -> BalancerV3Tracker {
    BalancerV3Tracker::new(chain.multicall(), BalancerV3Config::default()).unwrap()
}

#[tokio::test]
async fn test_track_then_quote() {
    let chain = Arc::new(chain(VaultState::default()));
    let updated = tracker(&chain)
        .get_new_pool_state(&entity(), TrackParams::default())
        .await
        .unwrap();

    assert_eq!(chain.eth_call_count(), 1);
    assert_eq!(updated.block_number, Some(BLOCK));
    assert_eq!(updated.reserves, vec![u(1000 * ONE), u(1000 * ONE)]);
    let extra: BalancerV3Extra = codec::decode(&updated.extra).unwrap();
    assert_eq!(extra.static_swap_fee_percentage, u(3_000_000_000_000_000));
    assert_eq!(extra.normalized_weights, vec![u(ONE / 2), u(ONE / 2)]);
    assert_eq!(extra.buffers, vec![None, None]);
    assert!(!extra.hooks_config.affects_swaps());

    let registry = registry::init().unwrap();
    let mut sim = registry.new_simulator(&updated).unwrap();
    let request = SwapRequest::exact_in(Address::repeat_byte(1), Address::repeat_byte(2), 10 * ONE);
    let first = sim.calc_amount_out(&request).unwrap();
    assert_eq!(first.amount.amount, u(9_871_580_343_970_612_000));

    // a second identical swap on the advanced state gets a worse price
    sim.update_balance(&request, &first);
    let second = sim.calc_amount_out(&request).unwrap();
    assert!(second.amount.amount < first.amount.amount);
}

#[tokio::test]
async fn test_paused_pool_rejects_swaps() {
    let chain = Arc::new(chain(VaultState {
        paused: true,
        ..VaultState::default()
    }));
    let updated = tracker(&chain)
        .get_new_pool_state(&entity(), TrackParams::default())
        .await
        .unwrap();

    let sim = registry::init().unwrap().new_simulator(&updated).unwrap();
    let err = sim
        .calc_amount_out(&SwapRequest::exact_in(0usize, 1usize, ONE))
        .unwrap_err();
    assert!(matches!(err, PoolError::PoolPaused));
}

#[tokio::test]
async fn test_swap_hooks_are_not_simulated() {
    let chain = Arc::new(chain(VaultState {
        before_swap_hook: true,
        ..VaultState::default()
    }));
    let updated = tracker(&chain)
        .get_new_pool_state(&entity(), TrackParams::default())
        .await
        .unwrap();

    let sim = registry::init().unwrap().new_simulator(&updated).unwrap();
    let err = sim
        .calc_amount_out(&SwapRequest::exact_in(0usize, 1usize, ONE))
        .unwrap_err();
    assert!(matches!(err, PoolError::HookNotSupported(_)));
}

#[tokio::test]
async fn test_vault_token_mismatch_is_terminal() {
    let chain = Arc::new(chain(VaultState {
        registered: vec![Address::repeat_byte(1), Address::repeat_byte(9)],
        ..VaultState::default()
    }));
    let err = tracker(&chain)
        .get_new_pool_state(&entity(), TrackParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::InvalidPool(_)));
}

#[tokio::test]
async fn test_buffered_token_reads_wrapper_totals() {
    let wrapper = Address::repeat_byte(0x0a);
    let chain = Arc::new(
        chain(VaultState {
            registered: vec![wrapper, Address::repeat_byte(2)],
            ..VaultState::default()
        })
        .returns(wrapper, &erc4626::TOTAL_ASSETS, vec![Token::Uint(u(1_250_000_000))])
        .returns(wrapper, &erc4626::TOTAL_SUPPLY, vec![Token::Uint(u(1_000_000_000))]),
    );
    let statics = BalancerV3StaticExtra {
        buffer_tokens: vec![Some(wrapper), None],
        ..BalancerV3StaticExtra::default()
    };
    let pool = entity().with_static_extra(codec::encode(&statics).unwrap());

    let updated = tracker(&chain)
        .get_new_pool_state(&pool, TrackParams::default())
        .await
        .unwrap();

    assert_eq!(chain.eth_call_count(), 1, "buffer reads ride in the same batch");
    let extra: BalancerV3Extra = codec::decode(&updated.extra).unwrap();
    let buffer = extra.buffers[0].expect("token 0 is buffered");
    assert_eq!(buffer.total_assets, u(1_250_000_000));
    assert_eq!(buffer.total_supply, u(1_000_000_000));
    assert!(extra.buffers[1].is_none());
    assert_eq!(updated.static_extra, pool.static_extra);
}
