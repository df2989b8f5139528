//! EVM contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the parts of the
//! bridge and token contracts the core reads and writes.

use alloy::sol;

sol! {
    /// Token bridge contract (read surface + pair registration event)
    #[sol(rpc)]
    contract Bridge {
        /// Amount of `token` the bridge holds for `user`
        function lockedTokens(address user, address token) external view returns (uint256);

        /// Current destination for an origin token; zero address when unmapped
        function getDestinationToken(address originToken) external view returns (address);

        /// Emitted whenever a pair is registered or overwritten
        event TokenPairSet(address indexed originToken, address indexed destinationToken);
    }
}

sol! {
    /// ERC20 token interface
    #[sol(rpc)]
    contract ERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function approve(address spender, uint256 amount) external returns (bool);

        event Approval(address indexed owner, address indexed spender, uint256 value);
    }
}
