//! Aave V3 contract bindings and event signatures.

use alloy::primitives::B256;
use alloy::sol;

sol! {
    /// Aave V3 Pool interface (subset for borrower tracking)
    #[sol(rpc)]
    interface IPool {
        event Supply(address indexed reserve, address user, address indexed onBehalfOf, uint256 amount, uint16 indexed referralCode);
        event Withdraw(address indexed reserve, address indexed user, address indexed to, uint256 amount);
        event Borrow(address indexed reserve, address user, address indexed onBehalfOf, uint256 amount, uint8 interestRateMode, uint256 borrowRate, uint16 indexed referralCode);
        event Repay(address indexed reserve, address indexed user, address indexed repayer, uint256 amount, bool useATokens);

        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );
    }
}

sol! {
    #[sol(rpc)]
    interface IPoolAddressesProvider {
        function getPool() external view returns (address);
        function getPoolDataProvider() external view returns (address);
        function getPriceOracle() external view returns (address);
    }
}

sol! {
    #[derive(Debug)]
    struct TokenData {
        string symbol;
        address tokenAddress;
    }

    /// Protocol data provider: per-reserve configuration and per-user balances
    #[sol(rpc)]
    interface IPoolDataProvider {
        function getAllReservesTokens() external view returns (TokenData[] memory);

        function getReserveConfigurationData(address asset) external view returns (
            uint256 decimals,
            uint256 ltv,
            uint256 liquidationThreshold,
            uint256 liquidationBonus,
            uint256 reserveFactor,
            bool usageAsCollateralEnabled,
            bool borrowingEnabled,
            bool stableBorrowRateEnabled,
            bool isActive,
            bool isFrozen
        );

        function getUserReserveData(address asset, address user) external view returns (
            uint256 currentATokenBalance,
            uint256 currentStableDebt,
            uint256 currentVariableDebt,
            uint256 principalStableDebt,
            uint256 scaledVariableDebt,
            uint256 stableBorrowRate,
            uint256 liquidityRate,
            uint40 stableRateLastUpdated,
            bool usageAsCollateralEnabled
        );
    }
}

// UiPoolDataProviderV3 layout of Aave pools before 3.2, which still carry
// the stable-debt fields. A 3.2+ provider returns a shorter struct that fails
// to decode; `decode_results` warns when that happens.
sol! {
    #[derive(Debug)]
    struct UserReserveData {
        address underlyingAsset;
        uint256 scaledATokenBalance;
        bool usageAsCollateralEnabledOnUser;
        uint256 stableBorrowRate;
        uint256 scaledVariableDebt;
        uint256 principalStableDebt;
        uint256 stableBorrowLastUpdateTimestamp;
    }

    #[sol(rpc)]
    interface IUiPoolDataProviderV3 {
        function getUserReservesData(address provider, address user)
            external
            view
            returns (UserReserveData[] memory, uint8);
    }
}

sol! {
    #[sol(rpc)]
    interface IAaveOracle {
        function getAssetsPrices(address[] calldata assets) external view returns (uint256[] memory);
    }
}

sol! {
    /// Flash-loan liquidation receiver deployed alongside the bot
    #[sol(rpc)]
    interface IFlashLoanLiquidator {
        function requestFlashLoan(
            address collateralAsset,
            address debtAsset,
            address user,
            uint256 debtToCover
        ) external;
    }
}

/// Pool event signatures (topic0).
pub mod aave_v3_signatures {
    use super::*;
    use alloy::sol_types::SolEvent;

    pub const SUPPLY: B256 = IPool::Supply::SIGNATURE_HASH;
    pub const WITHDRAW: B256 = IPool::Withdraw::SIGNATURE_HASH;
    pub const BORROW: B256 = IPool::Borrow::SIGNATURE_HASH;
    pub const REPAY: B256 = IPool::Repay::SIGNATURE_HASH;
}
